use std::collections::BTreeSet;

/// Display allow-list. Tracking stays global; the filter only decides which
/// records are shown.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum FilterSet {
    #[default]
    Disabled,
    Ids {
        ids: BTreeSet<u32>,
        follow_children: bool,
    },
    Hostnames {
        names: BTreeSet<String>,
    },
}

impl FilterSet {
    pub fn ids(ids: impl IntoIterator<Item = u32>, follow_children: bool) -> Self {
        let ids: BTreeSet<u32> = ids.into_iter().collect();
        if ids.is_empty() {
            return FilterSet::Disabled;
        }
        FilterSet::Ids {
            ids,
            follow_children,
        }
    }

    pub fn hostnames<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        let names: BTreeSet<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return FilterSet::Disabled;
        }
        FilterSet::Hostnames { names }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, FilterSet::Disabled)
    }

    /// A thread is accepted when its tid or pid is listed, or its hostname is.
    pub fn accepts(&self, tid: u32, pid: u32, hostname: Option<&str>) -> bool {
        match self {
            FilterSet::Disabled => true,
            FilterSet::Ids { ids, .. } => ids.contains(&tid) || ids.contains(&pid),
            FilterSet::Hostnames { names } => hostname.is_some_and(|h| names.contains(h)),
        }
    }

    /// Follow a fork: with child-following on, a child of an accepted pid is
    /// accepted from now on. Returns whether the filter changed.
    pub fn on_fork(&mut self, parent_pid: u32, child_tid: u32) -> bool {
        match self {
            FilterSet::Ids {
                ids,
                follow_children: true,
            } if ids.contains(&parent_pid) => ids.insert(child_tid),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_accepts_everything() {
        let filter = FilterSet::default();
        assert!(!filter.is_enabled());
        assert!(filter.accepts(1, 1, None));
    }

    #[test]
    fn empty_lists_disable_the_filter() {
        assert_eq!(FilterSet::ids([], true), FilterSet::Disabled);
        assert_eq!(FilterSet::hostnames(Vec::<String>::new()), FilterSet::Disabled);
    }

    #[test]
    fn id_filter_matches_tid_or_pid() {
        let filter = FilterSet::ids([2], false);
        assert!(filter.accepts(2, 1, None));
        assert!(!filter.accepts(1, 1, None));
        assert!(filter.accepts(3, 2, None));
    }

    #[test]
    fn hostname_filter_requires_hostname() {
        let filter = FilterSet::hostnames(["web-1"]);
        assert!(filter.accepts(1, 1, Some("web-1")));
        assert!(!filter.accepts(1, 1, Some("db-1")));
        assert!(!filter.accepts(1, 1, None));
    }

    #[test]
    fn fork_following_only_when_enabled() {
        let mut follow = FilterSet::ids([10], true);
        assert!(follow.on_fork(10, 42));
        assert!(follow.accepts(42, 42, None));
        assert!(!follow.on_fork(11, 43));

        let mut fixed = FilterSet::ids([10], false);
        assert!(!fixed.on_fork(10, 42));
        assert!(!fixed.accepts(42, 42, None));
    }
}
