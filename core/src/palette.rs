use crossterm::style::Color;

/// One (background, foreground) pair in the rainbow ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorPair {
    pub background: Color,
    pub foreground: Color,
}

/// The fixed rotation order. Yellow-on-black is the only slot with a
/// dark foreground; everything else reads best in white.
pub const PALETTE: [ColorPair; 6] = [
    ColorPair::new(Color::DarkRed, Color::White),
    ColorPair::new(Color::DarkYellow, Color::White),
    ColorPair::new(Color::Yellow, Color::Black),
    ColorPair::new(Color::DarkGreen, Color::White),
    ColorPair::new(Color::DarkBlue, Color::White),
    ColorPair::new(Color::DarkMagenta, Color::White),
];

impl ColorPair {
    pub const fn new(background: Color, foreground: Color) -> Self {
        Self {
            background,
            foreground,
        }
    }

    /// The slot a fresh session starts in.
    pub fn first() -> Self {
        PALETTE[0]
    }

    /// Advance one slot around the ring. Total and deterministic: any
    /// pair whose background is not in the ring normalizes back to the
    /// first slot.
    pub fn next(self) -> Self {
        match self.background {
            Color::DarkRed => PALETTE[1],
            Color::DarkYellow => PALETTE[2],
            Color::Yellow => PALETTE[3],
            Color::DarkGreen => PALETTE[4],
            Color::DarkBlue => PALETTE[5],
            _ => PALETTE[0],
        }
    }
}
