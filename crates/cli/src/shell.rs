// emunwa - Interactive shell
// Reads commands on a prompt thread and feeds them to the session as actions

use colored::Colorize;
use dialoguer::Input;
use emunwa_gui_core::Action;
use tokio::sync::mpsc::UnboundedSender;

/// A parsed shell line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Action(Action),
    Help,
}

pub const HELP: &str = "\
Commands:
  connect [HOST] | disconnect     toggle the connection
  info                            emulator info and status
  load-game PATH                  load a game file
  reset | stop | pause | resume | reload
  break | continue                debugger break/continue
  cores                           list cores
  select [N]                      select core N from the list (none clears)
  core-info | load-core           act on the selected core
  unload-core | core-current | core-reset
  read MEMORY [ADDRS]             e.g. read WRAM $231c;2
  write MEMORY ADDRS HEX          e.g. write WRAM $231c 01 00
  append on|off                   append memory dumps to the readout
  clear                           clear the readout
  test                            run the read/write self-test on WRAM
  help | quit";

/// Parse one line; `Ok(None)` for blank lines
pub fn parse_line(line: &str, default_host: &str) -> Result<Option<ShellCommand>, String> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let args: Vec<&str> = rest.split_whitespace().collect();

    let action = match word {
        "" => return Ok(None),
        "help" | "?" => return Ok(Some(ShellCommand::Help)),
        "connect" | "disconnect" => Action::ToggleConnection {
            host: args.first().copied().unwrap_or(default_host).to_string(),
        },
        "info" => Action::EmuInfo,
        "load-game" => {
            if rest.is_empty() {
                return Err("Usage: load-game PATH".to_string());
            }
            Action::LoadGame(rest.to_string())
        }
        "reset" => Action::EmuReset,
        "stop" => Action::EmuStop,
        "pause" => Action::EmuPause,
        "resume" => Action::EmuResume,
        "reload" => Action::EmuReload,
        "break" => Action::DebugBreak,
        "continue" => Action::DebugContinue,
        "cores" => Action::CoresList,
        "select" => match args.first() {
            None => Action::SelectCore(None),
            Some(n) => match n.parse::<usize>() {
                Ok(n) if n > 0 => Action::SelectCore(Some(n - 1)),
                _ => return Err(format!("Invalid core number '{}'", n)),
            },
        },
        "core-info" => Action::CoreInfo,
        "load-core" => Action::LoadCore,
        "unload-core" => Action::UnloadCore,
        "core-current" => Action::CoreCurrentInfo,
        "core-reset" => Action::CoreReset,
        "read" => match args.as_slice() {
            [memory] => Action::Read {
                memory: memory.to_string(),
                addresses: String::new(),
            },
            [memory, addresses] => Action::Read {
                memory: memory.to_string(),
                addresses: addresses.to_string(),
            },
            _ => return Err("Usage: read MEMORY [ADDRS]".to_string()),
        },
        "write" => match args.as_slice() {
            [memory, addresses, data @ ..] if !data.is_empty() => Action::Write {
                memory: memory.to_string(),
                addresses: addresses.to_string(),
                data: data.join(" "),
            },
            _ => return Err("Usage: write MEMORY ADDRS HEX".to_string()),
        },
        "append" => match args.first().copied() {
            Some("on") => Action::SetAppendReads(true),
            Some("off") => Action::SetAppendReads(false),
            _ => return Err("Usage: append on|off".to_string()),
        },
        "clear" => Action::ClearReadout,
        "test" => Action::ReadWriteTest,
        "quit" | "exit" => Action::Quit,
        other => return Err(format!("Unknown command '{}', type 'help'", other)),
    };
    Ok(Some(ShellCommand::Action(action)))
}

/// Prompt until `quit`, end of input, or the session goes away
///
/// Runs on its own thread since the prompt blocks.
pub fn prompt_loop(actions: UnboundedSender<Action>, default_host: String) {
    println!("{}", HELP.dimmed());
    loop {
        let line: String = match Input::new()
            .with_prompt("emunwa")
            .allow_empty(true)
            .interact_text()
        {
            Ok(line) => line,
            Err(_) => {
                let _ = actions.send(Action::Quit);
                return;
            }
        };

        match parse_line(&line, &default_host) {
            Ok(Some(ShellCommand::Action(action))) => {
                let quit = action == Action::Quit;
                if actions.send(action).is_err() || quit {
                    return;
                }
            }
            Ok(Some(ShellCommand::Help)) => println!("{}", HELP),
            Ok(None) => {}
            Err(e) => eprintln!("{}", e.red()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(line: &str) -> Action {
        match parse_line(line, "127.0.0.1") {
            Ok(Some(ShellCommand::Action(action))) => action,
            other => panic!("unexpected parse of {:?}: {:?}", line, other),
        }
    }

    #[test]
    fn test_blank_and_help() {
        assert_eq!(parse_line("   ", "h"), Ok(None));
        assert_eq!(parse_line("help", "h"), Ok(Some(ShellCommand::Help)));
    }

    #[test]
    fn test_connection_commands() {
        assert_eq!(
            action("connect"),
            Action::ToggleConnection {
                host: "127.0.0.1".into()
            }
        );
        assert_eq!(
            action("connect 192.168.0.9"),
            Action::ToggleConnection {
                host: "192.168.0.9".into()
            }
        );
    }

    #[test]
    fn test_game_path_keeps_spaces() {
        assert_eq!(
            action("load-game /roms/Secret of Evermore (USA).sfc"),
            Action::LoadGame("/roms/Secret of Evermore (USA).sfc".into())
        );
        assert!(parse_line("load-game", "h").is_err());
    }

    #[test]
    fn test_memory_commands() {
        assert_eq!(
            action("read WRAM $231c;2"),
            Action::Read {
                memory: "WRAM".into(),
                addresses: "$231c;2".into()
            }
        );
        assert_eq!(
            action("write WRAM $231c;1;$231b;3 63 00 03 00"),
            Action::Write {
                memory: "WRAM".into(),
                addresses: "$231c;1;$231b;3".into(),
                data: "63 00 03 00".into()
            }
        );
        assert!(parse_line("write WRAM $0", "h").is_err());
        assert!(parse_line("read", "h").is_err());
    }

    #[test]
    fn test_core_selection_is_one_based() {
        assert_eq!(action("select 2"), Action::SelectCore(Some(1)));
        assert_eq!(action("select"), Action::SelectCore(None));
        assert!(parse_line("select 0", "h").is_err());
        assert!(parse_line("select x", "h").is_err());
    }

    #[test]
    fn test_misc_commands() {
        assert_eq!(action("append on"), Action::SetAppendReads(true));
        assert_eq!(action("test"), Action::ReadWriteTest);
        assert_eq!(action("exit"), Action::Quit);
        assert!(parse_line("append maybe", "h").is_err());
        assert!(parse_line("fly", "h").is_err());
    }
}
