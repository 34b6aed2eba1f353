use crate::cli::Cli;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum OutputMode {
    Text,
    Json,
}

pub fn mode_for_cli(cli: &Cli) -> OutputMode {
    if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    }
}

#[cfg(test)]
mod tests {
    use super::{OutputMode, mode_for_cli};
    use crate::cli::parse_from;

    #[test]
    fn json_flag_is_accepted_before_or_after_the_command() {
        let leading = parse_from(["pennywise", "--json", "recurring", "process-due"]);
        assert!(leading.is_ok());
        if let Ok(cli) = leading {
            assert_eq!(mode_for_cli(&cli), OutputMode::Json);
        }

        let trailing = parse_from([
            "pennywise",
            "report",
            "summary",
            "--user",
            "usr_1",
            "--json",
        ]);
        assert!(trailing.is_ok());
        if let Ok(cli) = trailing {
            assert_eq!(mode_for_cli(&cli), OutputMode::Json);
        }
    }

    #[test]
    fn text_is_the_default() {
        let parsed = parse_from(["pennywise", "insights", "sweep"]);
        assert!(parsed.is_ok());
        if let Ok(cli) = parsed {
            assert_eq!(mode_for_cli(&cli), OutputMode::Text);
        }
    }
}
