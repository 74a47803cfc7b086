//! Colors for the status markers printed by `check`, `guard`, `config` and `run`.

use owo_colors::Style;

/// One style per status marker. All plain until [`Styles::colorize`] runs.
#[derive(Default, Clone, Copy)]
pub struct Styles {
    /// `✓` valid values, allowed actions, saved settings, clean exits.
    pub ok: Style,
    /// `⚠` actions that need `--confirm`.
    pub confirm: Style,
    /// `✗` rejected values, blocked actions, failed runs.
    pub failed: Style,
    /// Section titles such as the config file banner.
    pub title: Style,
}

impl Styles {
    /// Switch every marker to its terminal color.
    pub fn colorize(&mut self) {
        self.ok = Style::new().green();
        self.confirm = Style::new().yellow();
        self.failed = Style::new().red().bold();
        self.title = Style::new().bold().cyan();
    }
}
