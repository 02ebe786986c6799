//! Operator console: one command per stdin line.

use anyhow::{Context, anyhow, bail};
use latchkey_core::CredentialId;

pub const HELP: &str = "\
commands:
  open | system | cancel          front-panel buttons
  settings | close                enter or leave settings
  manual | register               settings: toggle manual unlocks, enroll a finger
  admin <id> on|off               settings: grant or revoke admin
  name <id> <nickname>            settings: rename a credential
  reset <id>                      settings: restore emergency uses
  remove <id>                     settings: delete a credential
  finger <hex> | lift             place a finger on the mock sensor, lift it
  yes | no                        answer the emergency-use question
  list | status | help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Open,
    System,
    Cancel,
    Settings,
    CloseSettings,
    ToggleManual,
    Register,
    SetAdmin { id: CredentialId, admin: bool },
    Rename { id: CredentialId, nickname: String },
    ResetEmergencyUses(CredentialId),
    Remove(CredentialId),
    Finger(Vec<u8>),
    Lift,
    Answer(bool),
    List,
    Status,
    Help,
    Quit,
}

impl ConsoleCommand {
    /// Parse a console line. Blank lines yield `None`.
    pub fn parse(line: &str) -> anyhow::Result<Option<Self>> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "" => return Ok(None),
            "open" => Self::Open,
            "system" => Self::System,
            "cancel" => Self::Cancel,
            "settings" => Self::Settings,
            "close" => Self::CloseSettings,
            "manual" => Self::ToggleManual,
            "register" => Self::Register,
            "admin" => {
                let (id, flag) = rest
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| anyhow!("usage: admin <id> on|off"))?;
                let admin = match flag.trim() {
                    "on" => true,
                    "off" => false,
                    other => bail!("expected on or off, got '{}'", other),
                };
                Self::SetAdmin {
                    id: parse_id(id)?,
                    admin,
                }
            }
            "name" => {
                let (id, nickname) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
                Self::Rename {
                    id: parse_id(id)?,
                    nickname: nickname.trim().to_string(),
                }
            }
            "reset" => Self::ResetEmergencyUses(parse_id(rest)?),
            "remove" => Self::Remove(parse_id(rest)?),
            "finger" => Self::Finger(parse_template(rest)?),
            "lift" => Self::Lift,
            "yes" | "y" => Self::Answer(true),
            "no" | "n" => Self::Answer(false),
            "list" => Self::List,
            "status" => Self::Status,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => bail!("unknown command '{}' (try help)", other),
        };

        Ok(Some(command))
    }
}

fn parse_id(raw: &str) -> anyhow::Result<CredentialId> {
    Ok(raw.parse()?)
}

/// Hex digits, two per byte, e.g. `f001`.
fn parse_template(raw: &str) -> anyhow::Result<Vec<u8>> {
    let raw = raw.trim();
    if raw.is_empty() || raw.len() % 2 != 0 || !raw.is_ascii() {
        bail!("a finger is an even number of hex digits");
    }

    (0..raw.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&raw[i..i + 2], 16)
                .with_context(|| format!("'{}' is not a hex byte", &raw[i..i + 2]))
        })
        .collect()
}
