//! Opcode assignments for the command set this daemon understands.
//!
//! These values must match the wire protocol established clients speak;
//! they are not free to renumber.

pub const MOUNT: u8 = 0x00;
pub const UNMOUNT: u8 = 0x01;

pub const OPENDIR: u8 = 0x10;
pub const READDIR: u8 = 0x11;
pub const CLOSEDIR: u8 = 0x12;
pub const MKDIR: u8 = 0x13;
pub const RMDIR: u8 = 0x14;
pub const TELLDIR: u8 = 0x15;
pub const SEEKDIR: u8 = 0x16;
pub const OPENDIRX: u8 = 0x17;
pub const READDIRX: u8 = 0x18;

pub const OPEN: u8 = 0x20;
pub const READ: u8 = 0x21;
pub const WRITE: u8 = 0x22;
pub const CLOSE: u8 = 0x23;
pub const STAT: u8 = 0x24;
pub const LSEEK: u8 = 0x25;
pub const UNLINK: u8 = 0x26;
pub const CHMOD: u8 = 0x27;
pub const RENAME: u8 = 0x28;
pub const OPEN_LEGACY: u8 = 0x29;

/// Every command this daemon recognizes, independent of its wire opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Mount,
    Unmount,
    OpenDir,
    ReadDir,
    CloseDir,
    MkDir,
    RmDir,
    TellDir,
    SeekDir,
    OpenDirX,
    ReadDirX,
    Open,
    OpenLegacy,
    Read,
    Write,
    Close,
    Stat,
    Lseek,
    Unlink,
    Chmod,
    Rename,
}

impl Command {
    /// The dispatcher classification for this command, per the
    /// session-opening / session-bearing / session-closing split.
    pub fn class(self) -> CommandClass {
        match self {
            Command::Mount => CommandClass::SessionOpening,
            Command::Unmount => CommandClass::SessionClosing,
            _ => CommandClass::SessionBearing,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandClass {
    SessionOpening,
    SessionBearing,
    SessionClosing,
}

const fn build_table() -> [Option<Command>; 256] {
    let mut table: [Option<Command>; 256] = [None; 256];
    table[MOUNT as usize] = Some(Command::Mount);
    table[UNMOUNT as usize] = Some(Command::Unmount);
    table[OPENDIR as usize] = Some(Command::OpenDir);
    table[READDIR as usize] = Some(Command::ReadDir);
    table[CLOSEDIR as usize] = Some(Command::CloseDir);
    table[MKDIR as usize] = Some(Command::MkDir);
    table[RMDIR as usize] = Some(Command::RmDir);
    table[TELLDIR as usize] = Some(Command::TellDir);
    table[SEEKDIR as usize] = Some(Command::SeekDir);
    table[OPENDIRX as usize] = Some(Command::OpenDirX);
    table[READDIRX as usize] = Some(Command::ReadDirX);
    table[OPEN as usize] = Some(Command::Open);
    table[OPEN_LEGACY as usize] = Some(Command::OpenLegacy);
    table[READ as usize] = Some(Command::Read);
    table[WRITE as usize] = Some(Command::Write);
    table[CLOSE as usize] = Some(Command::Close);
    table[STAT as usize] = Some(Command::Stat);
    table[LSEEK as usize] = Some(Command::Lseek);
    table[UNLINK as usize] = Some(Command::Unlink);
    table[CHMOD as usize] = Some(Command::Chmod);
    table[RENAME as usize] = Some(Command::Rename);
    table
}

/// Dense opcode -> command lookup table, covering the full `u8` space.
/// Unassigned slots fall through to "operation unsupported" at the
/// dispatcher rather than needing a match arm each.
pub static COMMAND_TABLE: [Option<Command>; 256] = build_table();

pub fn classify(opcode: u8) -> Option<Command> {
    COMMAND_TABLE[opcode as usize]
}
