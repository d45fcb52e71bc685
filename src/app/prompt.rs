use std::io::Write;

use tracing::{info, warn};

use crate::app::guid::score::Confidence;

/// Operator interaction points: a blocking acknowledgment when the device
/// needs a manual reboot, and a yes/no confirmation for medium/low confidence
/// identifiers.
pub trait OperatorPrompt: Send + Sync {
    fn acknowledge(&self, message: &str);
    fn confirm_guid(&self, guid: &str, confidence: Confidence) -> bool;
}

/// Interactive prompt for a console operator. When
/// `approve_low_confidence` is set, confirmation is answered positively
/// without blocking (the band is still logged).
pub struct ConsolePrompt {
    pub approve_low_confidence: bool,
}

impl OperatorPrompt for ConsolePrompt {
    fn acknowledge(&self, message: &str) {
        println!("{message}");
        print!("Press Enter to continue... ");
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        let _ = std::io::stdin().read_line(&mut line);
    }

    fn confirm_guid(&self, guid: &str, confidence: Confidence) -> bool {
        if self.approve_low_confidence {
            info!(guid, ?confidence, "auto-approving candidate");
            return true;
        }
        print!("Accept {confidence:?}-confidence GUID {guid}? [y/N] ");
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        let _ = std::io::stdin().read_line(&mut line);
        matches!(line.trim().to_lowercase().as_str(), "y" | "yes")
    }
}

/// Non-blocking prompt for unattended runs: acknowledgments are logged and
/// skipped, confirmation follows the configured approval flag.
pub struct AutoPrompt {
    pub approve_low_confidence: bool,
}

impl OperatorPrompt for AutoPrompt {
    fn acknowledge(&self, message: &str) {
        warn!("{message} (unattended: proceeding without acknowledgment)");
    }

    fn confirm_guid(&self, guid: &str, confidence: Confidence) -> bool {
        if self.approve_low_confidence {
            info!(guid, ?confidence, "auto-approving candidate");
        } else {
            warn!(guid, ?confidence, "candidate rejected (approval disabled)");
        }
        self.approve_low_confidence
    }
}
