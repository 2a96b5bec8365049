use cuadrilla_core::workflow::Confirm;
use std::io::{self, BufRead, Write};
use tracing::warn;

/// Yes/no gate answered on the terminal
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        if !atty::is(atty::Stream::Stdin) {
            warn!("stdin is not a terminal, pass --yes to confirm");
            return false;
        }
        eprint!("{} [y/N] ", prompt);
        let _ = io::stderr().flush();

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => is_yes(&answer),
            Err(e) => {
                warn!("Failed to read confirmation: {}", e);
                false
            }
        }
    }
}

/// Confirmation already given on the command line
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

pub fn is_yes(answer: &str) -> bool {
    matches!(
        answer.trim().to_lowercase().as_str(),
        "y" | "yes" | "s" | "si" | "sí"
    )
}

/// Read one line from stdin. Input is echoed; prefer piping it in.
pub fn read_secret(label: &str) -> anyhow::Result<String> {
    if atty::is(atty::Stream::Stdin) {
        eprint!("{}: ", label);
        io::stderr().flush()?;
    }
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answers() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" Si "));
        assert!(is_yes("YES"));
        assert!(!is_yes(""));
        assert!(!is_yes("n"));
        assert!(!is_yes("maybe"));
        assert!(AssumeYes.confirm("anything"));
    }
}
