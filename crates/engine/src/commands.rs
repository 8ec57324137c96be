//! Line-oriented command protocol read from stdin.
//!
//! One command per line, whitespace separated:
//!
//! ```text
//! reserve <unit> <actor> [ttl_secs]
//! release <unit> <actor>
//! extend  <unit> <actor> <secs>
//! advance <unit> <actor> <status>
//! cancel  <unit> <actor>
//! get     <unit>
//! list    [project]
//! ```
//!
//! An `<actor>` is an id, optionally followed by `+` and a comma separated
//! list of granted permissions: `0190c7e4-...+unit.release.override`.

use chrono::Duration;
use thiserror::Error;

use holdfast_auth::{Actor, Permission};
use holdfast_core::{ActorId, ProjectId, UnitId};
use holdfast_inventory::UnitStatus;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty command")]
    Empty,

    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("'{command}' expects: {usage}")]
    Usage {
        command: &'static str,
        usage: &'static str,
    },

    #[error("invalid {what} '{value}': {reason}")]
    InvalidArgument {
        what: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Reserve {
        unit_id: UnitId,
        actor: Actor,
        ttl: Option<Duration>,
    },
    Release {
        unit_id: UnitId,
        actor: Actor,
    },
    Extend {
        unit_id: UnitId,
        actor: Actor,
        additional: Duration,
    },
    Advance {
        unit_id: UnitId,
        actor: Actor,
        target: UnitStatus,
    },
    Cancel {
        unit_id: UnitId,
        actor: Actor,
    },
    Get {
        unit_id: UnitId,
    },
    List {
        project_id: Option<ProjectId>,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Reserve { .. } => "reserve",
            Command::Release { .. } => "release",
            Command::Extend { .. } => "extend",
            Command::Advance { .. } => "advance",
            Command::Cancel { .. } => "cancel",
            Command::Get { .. } => "get",
            Command::List { .. } => "list",
        }
    }
}

pub fn parse_line(line: &str) -> Result<Command, ParseError> {
    let mut words = line.split_whitespace();
    let name = words.next().ok_or(ParseError::Empty)?;
    let args: Vec<&str> = words.collect();

    match (name.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("reserve", [unit, actor]) => Ok(Command::Reserve {
            unit_id: parse_unit(unit)?,
            actor: parse_actor(actor)?,
            ttl: None,
        }),
        ("reserve", [unit, actor, ttl]) => Ok(Command::Reserve {
            unit_id: parse_unit(unit)?,
            actor: parse_actor(actor)?,
            ttl: Some(parse_secs(ttl)?),
        }),
        ("reserve", _) => Err(usage("reserve", "reserve <unit> <actor> [ttl_secs]")),

        ("release", [unit, actor]) => Ok(Command::Release {
            unit_id: parse_unit(unit)?,
            actor: parse_actor(actor)?,
        }),
        ("release", _) => Err(usage("release", "release <unit> <actor>")),

        ("extend", [unit, actor, secs]) => Ok(Command::Extend {
            unit_id: parse_unit(unit)?,
            actor: parse_actor(actor)?,
            additional: parse_secs(secs)?,
        }),
        ("extend", _) => Err(usage("extend", "extend <unit> <actor> <secs>")),

        ("advance", [unit, actor, status]) => Ok(Command::Advance {
            unit_id: parse_unit(unit)?,
            actor: parse_actor(actor)?,
            target: status.parse().map_err(|e| invalid("status", status, e))?,
        }),
        ("advance", _) => Err(usage("advance", "advance <unit> <actor> <status>")),

        ("cancel", [unit, actor]) => Ok(Command::Cancel {
            unit_id: parse_unit(unit)?,
            actor: parse_actor(actor)?,
        }),
        ("cancel", _) => Err(usage("cancel", "cancel <unit> <actor>")),

        ("get", [unit]) => Ok(Command::Get {
            unit_id: parse_unit(unit)?,
        }),
        ("get", _) => Err(usage("get", "get <unit>")),

        ("list", []) => Ok(Command::List { project_id: None }),
        ("list", [project]) => Ok(Command::List {
            project_id: Some(project.parse().map_err(|e| invalid("project", project, e))?),
        }),
        ("list", _) => Err(usage("list", "list [project]")),

        _ => Err(ParseError::UnknownCommand(name.to_string())),
    }
}

fn usage(command: &'static str, usage: &'static str) -> ParseError {
    ParseError::Usage { command, usage }
}

fn invalid(what: &'static str, value: &str, reason: impl ToString) -> ParseError {
    ParseError::InvalidArgument {
        what,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_unit(raw: &str) -> Result<UnitId, ParseError> {
    raw.parse().map_err(|e| invalid("unit", raw, e))
}

fn parse_actor(raw: &str) -> Result<Actor, ParseError> {
    let (id, grants) = match raw.split_once('+') {
        Some((id, grants)) => (id, Some(grants)),
        None => (raw, None),
    };
    let id: ActorId = id.parse().map_err(|e| invalid("actor", raw, e))?;

    let actor = grants
        .into_iter()
        .flat_map(|g| g.split(','))
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .fold(Actor::agent(id), |actor, grant| {
            actor.with_permission(Permission::new(grant.to_string()))
        });
    Ok(actor)
}

fn parse_secs(raw: &str) -> Result<Duration, ParseError> {
    let secs: i64 = raw.parse().map_err(|e| invalid("seconds", raw, e))?;
    Duration::try_seconds(secs).ok_or_else(|| invalid("seconds", raw, "out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use holdfast_auth::permissions::{CANCEL, RELEASE_OVERRIDE};

    const UNIT: &str = "0190c7e4-5b7a-7c3e-9a51-3f0e1d2c4b5a";
    const ACTOR: &str = "0190c7e4-5b7a-7c3e-9a51-aaaaaaaaaaaa";

    #[test]
    fn parses_reserve_with_and_without_ttl() {
        let cmd = parse_line(&format!("reserve {UNIT} {ACTOR}")).unwrap();
        assert!(matches!(cmd, Command::Reserve { ttl: None, .. }));

        let cmd = parse_line(&format!("  RESERVE {UNIT} {ACTOR} 3600 ")).unwrap();
        assert!(matches!(cmd, Command::Reserve { ttl: Some(t), .. } if t == Duration::hours(1)));
    }

    #[test]
    fn parses_actor_grants() {
        let cmd =
            parse_line(&format!("release {UNIT} {ACTOR}+unit.release.override,unit.cancel"))
                .unwrap();
        let Command::Release { actor, .. } = cmd else {
            panic!("expected release");
        };
        assert!(actor.has(&RELEASE_OVERRIDE));
        assert!(actor.has(&CANCEL));
        assert_eq!(actor.id.to_string(), ACTOR);
    }

    #[test]
    fn parses_advance_target() {
        let cmd = parse_line(&format!("advance {UNIT} {ACTOR} spa_pending")).unwrap();
        assert!(matches!(
            cmd,
            Command::Advance {
                target: UnitStatus::SpaPending,
                ..
            }
        ));
        let err = parse_line(&format!("advance {UNIT} {ACTOR} sold")).unwrap_err();
        assert!(matches!(err, ParseError::InvalidArgument { what: "status", .. }));
    }

    #[test]
    fn reports_usage_and_unknown_commands() {
        assert_eq!(parse_line("   "), Err(ParseError::Empty));
        assert!(matches!(
            parse_line("extend abc"),
            Err(ParseError::Usage { command: "extend", .. })
        ));
        assert_eq!(
            parse_line("book x"),
            Err(ParseError::UnknownCommand("book".to_string()))
        );
        assert!(matches!(
            parse_line("get not-a-uuid"),
            Err(ParseError::InvalidArgument { what: "unit", .. })
        ));
    }

    #[test]
    fn list_takes_an_optional_project() {
        assert_eq!(parse_line("list").unwrap(), Command::List { project_id: None });
        assert!(matches!(
            parse_line(&format!("list {UNIT}")).unwrap(),
            Command::List { project_id: Some(_) }
        ));
    }
}
