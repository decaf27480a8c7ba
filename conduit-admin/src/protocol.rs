//! Newline-delimited line protocol: `command arg1 arg2 ...`.

/// A parsed admin command line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Version,
    Shutdown,
    UserGenToken { username: String, acl: String },
    AppGenToken { table: String, acl: String },
    ShowConfig,
    ShowRules,
    NodeInfo { target: String, route_type: String },
    ConfigReload,
    Load(String),
    Unload(String),
    Reload(String),
    ReloadAll,
    List,
    ListPlugins,
    ListActions,
    Routes,
    RequestLog(String),
    ValidateConfig,
    Unlock(String),
    Permalock { file: String, user: String },
    ListLocks,
    Help,
    Exit,
}

impl Command {
    /// Parse one line of input. Unknown commands and arity mismatches
    /// produce a human-readable error that the caller writes back as the
    /// response — failures surface inline rather than closing the connection.
    pub fn parse(line: &str) -> Result<Self, String> {
        let mut parts = line.split_whitespace();
        let name = parts.next().ok_or_else(|| "empty command".to_string())?;
        let args: Vec<&str> = parts.collect();

        macro_rules! arity {
            ($n:expr) => {
                if args.len() != $n {
                    return Err(format!("{name} expects {} argument(s), got {}", $n, args.len()));
                }
            };
        }

        match name.to_ascii_lowercase().as_str() {
            "version" => Ok(Command::Version),
            "shutdown" => Ok(Command::Shutdown),
            "usergentoken" => {
                arity!(2);
                Ok(Command::UserGenToken { username: args[0].to_string(), acl: args[1].to_string() })
            }
            "appgentoken" => {
                arity!(2);
                Ok(Command::AppGenToken { table: args[0].to_string(), acl: args[1].to_string() })
            }
            "showconfig" => Ok(Command::ShowConfig),
            "showrules" => Ok(Command::ShowRules),
            "nodeinfo" => {
                arity!(2);
                Ok(Command::NodeInfo { target: args[0].to_string(), route_type: args[1].to_string() })
            }
            "configreload" => Ok(Command::ConfigReload),
            "load" => {
                arity!(1);
                Ok(Command::Load(args[0].to_string()))
            }
            "unload" => {
                arity!(1);
                Ok(Command::Unload(args[0].to_string()))
            }
            "reload" => {
                arity!(1);
                Ok(Command::Reload(args[0].to_string()))
            }
            "reloadall" => Ok(Command::ReloadAll),
            "list" => Ok(Command::List),
            "listplugins" => Ok(Command::ListPlugins),
            "listactions" => Ok(Command::ListActions),
            "routes" => Ok(Command::Routes),
            "requestlog" => {
                arity!(1);
                Ok(Command::RequestLog(args[0].to_string()))
            }
            "validate-config" => Ok(Command::ValidateConfig),
            "unlock" => {
                arity!(1);
                Ok(Command::Unlock(args[0].to_string()))
            }
            "permalock" => {
                arity!(2);
                Ok(Command::Permalock { file: args[0].to_string(), user: args[1].to_string() })
            }
            "listlocks" => Ok(Command::ListLocks),
            "help" => Ok(Command::Help),
            "exit" => Ok(Command::Exit),
            other => Err(format!("unknown command {other:?}")),
        }
    }
}

pub const HELP_TEXT: &str = "\
version | shutdown | userGenToken <username> <acl> | appGenToken <table> <acl> |
showConfig | showRules | nodeInfo <route|table> <routeType> | configReload |
load|unload|reload <plugin> | reloadall | list | listPlugins | listActions |
routes | requestLog <id> | validate-config | unlock <file> |
permalock <file> <user> | listlocks | help | exit";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nullary_commands_case_insensitively() {
        assert_eq!(Command::parse("VERSION").unwrap(), Command::Version);
        assert_eq!(Command::parse("showConfig").unwrap(), Command::ShowConfig);
    }

    #[test]
    fn parses_commands_with_arguments() {
        assert_eq!(
            Command::parse("userGenToken alice admin").unwrap(),
            Command::UserGenToken { username: "alice".to_string(), acl: "admin".to_string() }
        );
        assert_eq!(Command::parse("load myplugin").unwrap(), Command::Load("myplugin".to_string()));
    }

    #[test]
    fn rejects_wrong_arity() {
        assert!(Command::parse("load").is_err());
        assert!(Command::parse("load a b").is_err());
    }

    #[test]
    fn rejects_unknown_command() {
        assert!(Command::parse("frobnicate").is_err());
    }

    #[test]
    fn rejects_empty_line() {
        assert!(Command::parse("   ").is_err());
    }
}
