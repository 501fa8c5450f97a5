//! Line protocol spoken between `spinframe` and the `turntable` daemon.
//!
//! One command per line, answered by one `ok ...` or `err ...` line.

use crate::input::{InputEvent, Point};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const SOCKET_PATH: &str = "/tmp/turntable.sock";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}'")]
    Unknown(String),
    #[error("'{command}' expects {expected} argument(s)")]
    Arity {
        command: &'static str,
        expected: usize,
    },
    #[error("'{0}' is not a number")]
    Number(String),
    #[error("malformed reply '{0}'")]
    Reply(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Open(String),
    Close,
    Status,
    Products,
    Input(InputEvent),
}

impl FromStr for Command {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let name = words.next().ok_or(ProtocolError::Empty)?;
        let args: Vec<&str> = words.collect();

        let command = match name {
            "open" => {
                let [path] = arity::<1>("open", &args)?;
                Command::Open(path.to_string())
            }
            "close" => {
                arity::<0>("close", &args)?;
                Command::Close
            }
            "status" => {
                arity::<0>("status", &args)?;
                Command::Status
            }
            "products" => {
                arity::<0>("products", &args)?;
                Command::Products
            }
            "down" => Command::Input(InputEvent::PointerDown(point("down", &args)?)),
            "move" => Command::Input(InputEvent::PointerMove(point("move", &args)?)),
            "up" => {
                arity::<0>("up", &args)?;
                Command::Input(InputEvent::PointerUp)
            }
            "leave" => {
                arity::<0>("leave", &args)?;
                Command::Input(InputEvent::PointerLeave)
            }
            "touchstart" => Command::Input(InputEvent::TouchStart(point("touchstart", &args)?)),
            "touchmove" => Command::Input(InputEvent::TouchMove(point("touchmove", &args)?)),
            "touchend" => {
                arity::<0>("touchend", &args)?;
                Command::Input(InputEvent::TouchEnd)
            }
            "wheel" => {
                let [dy] = arity::<1>("wheel", &args)?;
                Command::Input(InputEvent::Wheel(number(dy)?))
            }
            other => return Err(ProtocolError::Unknown(other.to_string())),
        };
        Ok(command)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Open(path) => write!(f, "open {path}"),
            Command::Close => write!(f, "close"),
            Command::Status => write!(f, "status"),
            Command::Products => write!(f, "products"),
            Command::Input(event) => match event {
                InputEvent::PointerDown(p) => write!(f, "down {} {}", p.x, p.y),
                InputEvent::PointerMove(p) => write!(f, "move {} {}", p.x, p.y),
                InputEvent::PointerUp => write!(f, "up"),
                InputEvent::PointerLeave => write!(f, "leave"),
                InputEvent::TouchStart(p) => write!(f, "touchstart {} {}", p.x, p.y),
                InputEvent::TouchMove(p) => write!(f, "touchmove {} {}", p.x, p.y),
                InputEvent::TouchEnd => write!(f, "touchend"),
                InputEvent::Wheel(dy) => write!(f, "wheel {dy}"),
            },
        }
    }
}

fn arity<'a, const N: usize>(
    command: &'static str,
    args: &[&'a str],
) -> Result<[&'a str; N], ProtocolError> {
    <[&str; N]>::try_from(args).map_err(|_| ProtocolError::Arity {
        command,
        expected: N,
    })
}

fn number(s: &str) -> Result<f64, ProtocolError> {
    s.parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| ProtocolError::Number(s.to_string()))
}

fn point(command: &'static str, args: &[&str]) -> Result<Point, ProtocolError> {
    let [x, y] = arity::<2>(command, args)?;
    Ok(Point::new(number(x)?, number(y)?))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ok(String),
    Error(String),
}

impl Reply {
    pub fn ok(text: impl fmt::Display) -> Self {
        Reply::Ok(text.to_string())
    }

    pub fn err(text: impl fmt::Display) -> Self {
        Reply::Error(text.to_string())
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Replies are single lines; multi-line text is folded with " | ".
        let (tag, text) = match self {
            Reply::Ok(text) => ("ok", text),
            Reply::Error(text) => ("err", text),
        };
        let text = text.lines().collect::<Vec<_>>().join(" | ");
        if text.is_empty() {
            write!(f, "{tag}")
        } else {
            write!(f, "{tag} {text}")
        }
    }
}

impl FromStr for Reply {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self, ProtocolError> {
        let (tag, text) = line.split_once(' ').unwrap_or((line, ""));
        match tag {
            "ok" => Ok(Reply::Ok(text.to_string())),
            "err" => Ok(Reply::Error(text.to_string())),
            _ => Err(ProtocolError::Reply(line.to_string())),
        }
    }
}
