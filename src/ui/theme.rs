use ratatui::style::Color;

/// What the attached terminal can draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSupport {
    Truecolor,
    Color256,
    Mono,
}

/// Honour `NO_COLOR`, then trust `COLORTERM` for 24-bit output.
pub fn detect_color_support() -> ColorSupport {
    if std::env::var_os("NO_COLOR").is_some() {
        return ColorSupport::Mono;
    }
    match std::env::var("COLORTERM").map(|v| v.to_ascii_lowercase()) {
        Ok(v) if v == "truecolor" || v == "24bit" => ColorSupport::Truecolor,
        _ => ColorSupport::Color256,
    }
}

#[derive(Debug, Clone)]
pub struct Theme {
    pub name: &'static str,
    pub title_bg: Color,
    pub title_fg: Color,
    pub border: Color,
    pub text: Color,
    pub text_dim: Color,
    pub column_fg: Color,
    pub thread_fg: Color,
    pub bar_bg: Color,
    pub key_bg: Color,
    pub key_fg: Color,
    pub key_label_fg: Color,
    pub key_label_bg: Color,
    /// CPU load ramp, from idle to saturated.
    pub load: [Color; 5],
}

impl Theme {
    pub fn from_config(name: &str, support: ColorSupport) -> Self {
        let mut theme = match (support, name.to_ascii_lowercase().as_str()) {
            (ColorSupport::Mono, _) | (_, "mono") => Self::mono(),
            (_, "light") => Self::light(),
            _ => Self::dark(),
        };
        if support != ColorSupport::Truecolor {
            for color in theme.colors_mut() {
                *color = downgrade(*color, support);
            }
        }
        theme
    }

    fn colors_mut(&mut self) -> impl Iterator<Item = &mut Color> {
        [
            &mut self.title_bg,
            &mut self.title_fg,
            &mut self.border,
            &mut self.text,
            &mut self.text_dim,
            &mut self.column_fg,
            &mut self.thread_fg,
            &mut self.bar_bg,
            &mut self.key_bg,
            &mut self.key_fg,
            &mut self.key_label_fg,
            &mut self.key_label_bg,
        ]
        .into_iter()
        .chain(self.load.iter_mut())
    }

    /// Color for a CPU share in percent.
    pub fn load_color(&self, percent: f64) -> Color {
        const STEPS: [f64; 4] = [1.0, 25.0, 50.0, 90.0];
        let step = STEPS.iter().take_while(|&&edge| percent >= edge).count();
        self.load[step]
    }

    pub fn dark() -> Self {
        Self {
            name: "dark",
            title_bg: Color::Cyan,
            title_fg: Color::Black,
            border: Color::Rgb(88, 91, 112),
            text: Color::Rgb(205, 214, 244),
            text_dim: Color::Rgb(147, 153, 178),
            column_fg: Color::Rgb(137, 180, 250),
            thread_fg: Color::Rgb(148, 226, 213),
            bar_bg: Color::Rgb(49, 50, 68),
            key_bg: Color::Rgb(249, 226, 175),
            key_fg: Color::Black,
            key_label_fg: Color::Rgb(205, 214, 244),
            key_label_bg: Color::Rgb(69, 71, 90),
            load: [
                Color::Rgb(108, 112, 134),
                Color::Rgb(166, 227, 161),
                Color::Rgb(249, 226, 175),
                Color::Rgb(250, 179, 135),
                Color::Rgb(243, 139, 168),
            ],
        }
    }

    pub fn light() -> Self {
        Self {
            name: "light",
            title_bg: Color::Rgb(30, 102, 245),
            title_fg: Color::White,
            border: Color::Rgb(172, 176, 190),
            text: Color::Rgb(76, 79, 105),
            text_dim: Color::Rgb(124, 127, 147),
            column_fg: Color::Rgb(30, 102, 245),
            thread_fg: Color::Rgb(23, 146, 153),
            bar_bg: Color::Rgb(230, 233, 239),
            key_bg: Color::Rgb(136, 57, 239),
            key_fg: Color::White,
            key_label_fg: Color::Rgb(76, 79, 105),
            key_label_bg: Color::Rgb(204, 208, 218),
            load: [
                Color::Rgb(156, 160, 176),
                Color::Rgb(64, 160, 43),
                Color::Rgb(223, 142, 29),
                Color::Rgb(254, 100, 11),
                Color::Rgb(210, 15, 57),
            ],
        }
    }

    pub fn mono() -> Self {
        Self {
            name: "mono",
            title_bg: Color::White,
            title_fg: Color::Black,
            border: Color::Gray,
            text: Color::White,
            text_dim: Color::Gray,
            column_fg: Color::White,
            thread_fg: Color::Gray,
            bar_bg: Color::Reset,
            key_bg: Color::White,
            key_fg: Color::Black,
            key_label_fg: Color::White,
            key_label_bg: Color::Reset,
            load: [
                Color::DarkGray,
                Color::Gray,
                Color::White,
                Color::White,
                Color::White,
            ],
        }
    }
}

fn downgrade(color: Color, support: ColorSupport) -> Color {
    let Color::Rgb(r, g, b) = color else {
        return match (support, color) {
            (ColorSupport::Mono, Color::Black | Color::White | Color::Gray | Color::DarkGray) => {
                color
            }
            (ColorSupport::Mono, Color::Reset) => Color::Reset,
            (ColorSupport::Mono, _) => Color::White,
            _ => color,
        };
    };
    match support {
        ColorSupport::Truecolor => color,
        ColorSupport::Color256 => Color::Indexed(xterm_index(r, g, b)),
        ColorSupport::Mono => {
            // Rec. 601 luma in integer math
            let luma = (299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b)) / 1000;
            if luma >= 128 { Color::White } else { Color::Black }
        }
    }
}

/// Nearest entry of the xterm 6x6x6 color cube.
fn xterm_index(r: u8, g: u8, b: u8) -> u8 {
    const LEVELS: [u8; 6] = [0, 95, 135, 175, 215, 255];
    let nearest = |c: u8| {
        LEVELS
            .iter()
            .enumerate()
            .min_by_key(|&(_, &level)| level.abs_diff(c))
            .map_or(0, |(i, _)| i as u8)
    };
    16 + 36 * nearest(r) + 6 * nearest(g) + nearest(b)
}
