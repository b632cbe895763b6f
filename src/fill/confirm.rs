use std::io::{BufRead, Write};
use std::rc::Rc;

/// Blocking yes/no prompt shown before a risky fill.
pub trait ConfirmPrompt {
    fn confirm(&self, message: &str) -> bool;
}

impl<T: ConfirmPrompt + ?Sized> ConfirmPrompt for Rc<T> {
    fn confirm(&self, message: &str) -> bool {
        (**self).confirm(message)
    }
}

/// Answers every prompt the same way.
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

impl ConfirmPrompt for AutoConfirm {
    fn confirm(&self, _message: &str) -> bool {
        self.0
    }
}

/// Asks on stderr, reads the answer from stdin. Anything but `y`/`yes`
/// declines.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalConfirm;

impl ConfirmPrompt for TerminalConfirm {
    fn confirm(&self, message: &str) -> bool {
        let mut stderr = std::io::stderr();
        if writeln!(stderr, "{}", message).is_err() || write!(stderr, "Continue? [y/N] ").is_err() {
            return false;
        }
        let _ = stderr.flush();

        let mut answer = String::new();
        if std::io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

/// Confirmation texts. `{hostname}` is substituted.
#[derive(Debug, Clone)]
pub struct Localizer {
    pub insecure_page_warning: String,
    pub insecure_page_fill_prompt: String,
    pub iframe_warning: String,
    pub iframe_warning_tip: String,
}

impl Default for Localizer {
    fn default() -> Self {
        Localizer {
            insecure_page_warning: "Warning: this is an unsecured HTTP page. Information you submit \
                can be seen and changed by others. This login was saved on a secure (HTTPS) page."
                .to_string(),
            insecure_page_fill_prompt: "Do you still want to fill this login on {hostname}?"
                .to_string(),
            iframe_warning: "This form is hosted by a different domain than the URI of your saved \
                login. Choose OK to fill anyway, or Cancel to stop."
                .to_string(),
            iframe_warning_tip: "To skip this warning in the future, save {hostname} to the login \
                item for this site."
                .to_string(),
        }
    }
}

impl Localizer {
    pub fn insecure_page_message(&self, hostname: &str) -> String {
        [
            self.insecure_page_warning.replace("{hostname}", hostname),
            self.insecure_page_fill_prompt.replace("{hostname}", hostname),
        ]
        .join("\n\n")
    }

    pub fn untrusted_iframe_message(&self, hostname: &str) -> String {
        [
            self.iframe_warning.replace("{hostname}", hostname),
            self.iframe_warning_tip.replace("{hostname}", hostname),
        ]
        .join("\n\n")
    }
}
