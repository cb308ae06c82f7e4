//! Control-port command vocabulary.
//!
//! Strategies and the session speak [`Command`]; the control channel
//! serializes it to the ascii tokens the drone firmware expects.

use std::fmt;

/// A single command sent over the control port.
///
/// Distances are centimeters, speeds centimeters per second, rotations
/// degrees. `Go` optionally references a mission pad, which makes the
/// displacement pad-relative instead of body-relative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `command` - enter SDK mode.
    SdkMode,
    /// `takeoff`
    Takeoff,
    /// `land`
    Land,
    /// `go <x> <y> <z> <speed> [m<pad>]`
    Go {
        x: i32,
        y: i32,
        z: i32,
        speed: u32,
        pad: Option<u8>,
    },
    /// `left <cm>`
    Left(u32),
    /// `right <cm>`
    Right(u32),
    /// `forward <cm>`
    Forward(u32),
    /// `cw <deg>` - rotate clockwise.
    RotateCw(u32),
    /// `ccw <deg>` - rotate counter-clockwise.
    RotateCcw(u32),
    /// `EXT mled s r <char>` - show a label on the LED matrix.
    MatrixLabel(char),
    /// `EXT tof?` - query the front time-of-flight range sensor.
    RangeQuery,
    /// `EXT led <r> <g> <b>` - set the top LED colour.
    Led { r: u8, g: u8, b: u8 },
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::SdkMode => write!(f, "command"),
            Command::Takeoff => write!(f, "takeoff"),
            Command::Land => write!(f, "land"),
            Command::Go {
                x,
                y,
                z,
                speed,
                pad: Some(pad),
            } => write!(f, "go {x} {y} {z} {speed} m{pad}"),
            Command::Go {
                x,
                y,
                z,
                speed,
                pad: None,
            } => write!(f, "go {x} {y} {z} {speed}"),
            Command::Left(cm) => write!(f, "left {cm}"),
            Command::Right(cm) => write!(f, "right {cm}"),
            Command::Forward(cm) => write!(f, "forward {cm}"),
            Command::RotateCw(deg) => write!(f, "cw {deg}"),
            Command::RotateCcw(deg) => write!(f, "ccw {deg}"),
            Command::MatrixLabel(c) => write!(f, "EXT mled s r {c}"),
            Command::RangeQuery => write!(f, "EXT tof?"),
            Command::Led { r, g, b } => write!(f, "EXT led {r} {g} {b}"),
        }
    }
}
