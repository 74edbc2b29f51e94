use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::Mutex;

use crate::logger;

/// Everything external decision logic may ask the key controller to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    WalkLeft,
    WalkRight,
    JumpLeft,
    JumpRight,
    JumpDown,
    Jump,
    Up,
    Down,
    TeleportLeft,
    TeleportRight,
    TeleportUp,
    TeleportDown,
    Attack,
    AttackLeft,
    AttackRight,
    Stop,
    Heal,
    AddMp,
}

impl Command {
    pub fn parse(s: &str) -> Option<Command> {
        let cmd = match s {
            "walk left" => Command::WalkLeft,
            "walk right" => Command::WalkRight,
            "jump left" => Command::JumpLeft,
            "jump right" => Command::JumpRight,
            "jump down" => Command::JumpDown,
            "jump" => Command::Jump,
            "up" => Command::Up,
            "down" => Command::Down,
            "teleport left" => Command::TeleportLeft,
            "teleport right" => Command::TeleportRight,
            "teleport up" => Command::TeleportUp,
            "teleport down" => Command::TeleportDown,
            "attack" => Command::Attack,
            "attack left" => Command::AttackLeft,
            "attack right" => Command::AttackRight,
            "stop" => Command::Stop,
            "heal" => Command::Heal,
            "add mp" => Command::AddMp,
            _ => return None,
        };
        Some(cmd)
    }

    /// One-shots run once and must not be lost; sustained commands are
    /// re-honored every controller iteration until replaced.
    pub fn is_one_shot(self) -> bool {
        matches!(self, Command::Stop | Command::Heal | Command::AddMp)
    }
}

/// Intent mailbox between decision logic and the key controller.
///
/// Sustained commands live in a last-write-wins slot. One-shots travel
/// through a bounded channel of capacity one so a sustained write that
/// follows quickly cannot silently overwrite them.
pub struct CommandSlot {
    sustained: Mutex<Option<Command>>,
    one_shot_tx: SyncSender<Command>,
    one_shot_rx: Mutex<Receiver<Command>>,
}

impl Default for CommandSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandSlot {
    pub fn new() -> Self {
        let (tx, rx) = sync_channel(1);
        Self {
            sustained: Mutex::new(None),
            one_shot_tx: tx,
            one_shot_rx: Mutex::new(rx),
        }
    }

    /// Accept a raw command string. Empty clears the sustained slot;
    /// unrecognized strings are silently ignored.
    pub fn set(&self, raw: &str) {
        if raw.is_empty() {
            self.clear_sustained();
            return;
        }
        let Some(cmd) = Command::parse(raw) else {
            return;
        };
        if cmd.is_one_shot() {
            if let Err(TrySendError::Full(_)) = self.one_shot_tx.try_send(cmd) {
                logger::warn(&format!("one-shot '{}' dropped, previous still pending", raw));
            }
        } else if let Ok(mut slot) = self.sustained.lock() {
            *slot = Some(cmd);
        }
    }

    pub fn sustained(&self) -> Option<Command> {
        self.sustained.lock().ok().and_then(|s| *s)
    }

    pub fn clear_sustained(&self) {
        if let Ok(mut slot) = self.sustained.lock() {
            *slot = None;
        }
    }

    pub fn take_one_shot(&self) -> Option<Command> {
        self.one_shot_rx.lock().ok().and_then(|rx| rx.try_recv().ok())
    }
}
