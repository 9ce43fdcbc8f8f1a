use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::time::Duration;

const TEMPLATE_SPINNER: &str = "{spinner} {msg}";
const TICK: Duration = Duration::from_millis(100);

pub struct Spinner {
    bar: ProgressBar,
    message: String,
}

impl Spinner {
    pub fn start(message: impl Into<String>, quiet: bool) -> Self {
        let message = message.into();
        let bar = if quiet || !std::io::stderr().is_terminal() {
            ProgressBar::hidden()
        } else {
            ProgressBar::new_spinner()
        };
        if let Ok(style) = ProgressStyle::with_template(TEMPLATE_SPINNER) {
            bar.set_style(style.tick_strings(&["|", "/", "-", "\\", "✓"]));
        }
        bar.set_message(message.clone());
        bar.enable_steady_tick(TICK);
        Self { bar, message }
    }

    pub fn is_hidden(&self) -> bool {
        self.bar.is_hidden()
    }

    /// Stop ticking and print the completion line. The ticker thread is
    /// joined first, so nothing is drawn after this returns.
    pub fn stop(self) {
        self.bar.disable_steady_tick();
        self.bar
            .finish_with_message(format!("{} - done.", self.message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_spinner_is_hidden_and_stops() {
        let spinner = Spinner::start("Analyzing", true);
        assert!(spinner.is_hidden());
        spinner.stop();
    }
}
