//! Turns console lines into client packets.
//!
//! Lines starting with one of the local commands below map to a gameplay
//! packet; every other line, including `/who` and `/me`, is sent as chat.

use shared::game::{EquipmentSlot, StatType, MAX_CLIENT_SAY_LENGTH};
use shared::protocol::client;
use shared::{InventorySlot, MapEntityIndex};

const HELP: &str = "/left /right /stop /jump /attack /use /ping \
/pickup <entity> /raise <stat> /useitem <slot> /drop <slot> /info <slot> \
/equipinfo <equip> /unequip <equip> /quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    MoveLeft,
    MoveRight,
    Stop,
    Jump,
    Attack,
    UseWorld,
    Ping,
    Pickup(MapEntityIndex),
    RaiseStat(StatType),
    UseItem(InventorySlot),
    DropItem(InventorySlot),
    ItemInfo(InventorySlot),
    EquipmentInfo(EquipmentSlot),
    Unequip(EquipmentSlot),
    Say(String),
    Help,
    Quit,
}

impl Command {
    /// Parses one console line. `Err` carries a usage hint.
    pub fn parse(line: &str) -> Result<Option<Command>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let Some(rest) = line.strip_prefix('/') else {
            return say(line).map(Some);
        };
        let (name, arg) = match rest.split_once(' ') {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };

        let command = match name.to_ascii_lowercase().as_str() {
            "left" => Command::MoveLeft,
            "right" => Command::MoveRight,
            "stop" => Command::Stop,
            "jump" => Command::Jump,
            "attack" => Command::Attack,
            "use" => Command::UseWorld,
            "ping" => Command::Ping,
            "help" => Command::Help,
            "quit" | "exit" => Command::Quit,
            "pickup" => Command::Pickup(MapEntityIndex::new(number(name, arg)?)),
            "raise" => Command::RaiseStat(stat(arg)?),
            "useitem" => Command::UseItem(InventorySlot::new(number(name, arg)?)),
            "drop" => Command::DropItem(InventorySlot::new(number(name, arg)?)),
            "info" => Command::ItemInfo(InventorySlot::new(number(name, arg)?)),
            "equipinfo" => Command::EquipmentInfo(equipment_slot(arg)?),
            "unequip" => Command::Unequip(equipment_slot(arg)?),
            _ => say(line)?,
        };
        Ok(Some(command))
    }

    /// The packet this command sends, if any. `now_ms` stamps pings.
    pub fn packet(&self, now_ms: u32) -> Option<Vec<u8>> {
        let data = match self {
            Command::MoveLeft => client::move_left(),
            Command::MoveRight => client::move_right(),
            Command::Stop => client::move_stop(),
            Command::Jump => client::jump(),
            Command::Attack => client::attack(),
            Command::UseWorld => client::use_world(),
            Command::Ping => client::ping(now_ms),
            Command::Pickup(index) => client::pickup_item(*index),
            Command::RaiseStat(stat) => client::raise_stat(*stat),
            Command::UseItem(slot) => client::use_inventory_item(*slot),
            Command::DropItem(slot) => client::drop_inventory_item(*slot),
            Command::ItemInfo(slot) => client::get_inventory_item_info(*slot),
            Command::EquipmentInfo(slot) => client::get_equipment_item_info(*slot),
            Command::Unequip(slot) => client::unequip_item(*slot),
            Command::Say(text) => client::say(text),
            Command::Help | Command::Quit => return None,
        };
        Some(data)
    }

    /// Movement is sent unreliably; everything else needs the reliable channel.
    pub fn is_reliable(&self) -> bool {
        !matches!(self, Command::MoveLeft | Command::MoveRight | Command::Stop)
    }

    pub fn help() -> &'static str {
        HELP
    }
}

/// The server treats longer chat as a malformed packet.
fn say(line: &str) -> Result<Command, String> {
    if line.len() > MAX_CLIENT_SAY_LENGTH {
        return Err(format!(
            "chat line is {} bytes, the limit is {}",
            line.len(),
            MAX_CLIENT_SAY_LENGTH
        ));
    }
    Ok(Command::Say(line.to_string()))
}

fn number<T: std::str::FromStr>(command: &str, arg: &str) -> Result<T, String> {
    arg.parse()
        .map_err(|_| format!("usage: /{command} <number>, got `{arg}`"))
}

fn stat(arg: &str) -> Result<StatType, String> {
    StatType::ALL
        .iter()
        .copied()
        .find(|stat| stat.name().eq_ignore_ascii_case(arg))
        .ok_or_else(|| {
            let names: Vec<_> = StatType::ALL.iter().map(|stat| stat.name()).collect();
            format!("unknown stat `{arg}`, expected one of {}", names.join(", "))
        })
}

fn equipment_slot(arg: &str) -> Result<EquipmentSlot, String> {
    EquipmentSlot::ALL
        .iter()
        .copied()
        .find(|slot| slot.name().eq_ignore_ascii_case(arg))
        .ok_or_else(|| {
            let names: Vec<_> = EquipmentSlot::ALL.iter().map(|slot| slot.name()).collect();
            format!("unknown slot `{arg}`, expected one of {}", names.join(", "))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::protocol::ClientPacketId;
    use shared::BitReader;

    fn id_of(data: &[u8]) -> ClientPacketId {
        BitReader::new(data).read().unwrap()
    }

    #[test]
    fn test_plain_text_and_server_commands_are_chat() {
        assert_eq!(Command::parse("hello"), Ok(Some(Command::Say("hello".into()))));
        assert_eq!(Command::parse("/who"), Ok(Some(Command::Say("/who".into()))));
        assert_eq!(
            Command::parse("/me waves"),
            Ok(Some(Command::Say("/me waves".into())))
        );
        assert_eq!(Command::parse("   "), Ok(None));
    }

    #[test]
    fn test_chat_longer_than_the_server_accepts_is_refused() {
        let longest = "a".repeat(MAX_CLIENT_SAY_LENGTH);
        assert_eq!(
            Command::parse(&longest),
            Ok(Some(Command::Say(longest.clone())))
        );
        assert!(Command::parse(&"a".repeat(MAX_CLIENT_SAY_LENGTH + 1)).is_err());
        assert!(Command::parse(&format!("/me {}", "a".repeat(MAX_CLIENT_SAY_LENGTH))).is_err());
    }

    #[test]
    fn test_local_commands() {
        assert_eq!(Command::parse("/LEFT"), Ok(Some(Command::MoveLeft)));
        assert_eq!(Command::parse("/quit"), Ok(Some(Command::Quit)));
        assert_eq!(
            Command::parse("/pickup 12"),
            Ok(Some(Command::Pickup(MapEntityIndex::new(12))))
        );
        assert_eq!(
            Command::parse("/raise str"),
            Ok(Some(Command::RaiseStat(StatType::Str)))
        );
        assert_eq!(
            Command::parse("/unequip righthand"),
            Ok(Some(Command::Unequip(EquipmentSlot::RightHand)))
        );
        assert!(Command::parse("/drop many").is_err());
        assert!(Command::parse("/raise luck").is_err());
    }

    #[test]
    fn test_packets_carry_the_right_id() {
        let cases = [
            (Command::MoveRight, ClientPacketId::MoveRight),
            (Command::Jump, ClientPacketId::Jump),
            (Command::Ping, ClientPacketId::Ping),
            (Command::UseWorld, ClientPacketId::UseWorld),
            (Command::Say("hi".into()), ClientPacketId::Say),
        ];
        for (command, id) in cases {
            assert_eq!(id_of(&command.packet(7).unwrap()), id);
        }
        assert_eq!(Command::Quit.packet(0), None);
    }

    #[test]
    fn test_channel_choice() {
        assert!(!Command::MoveLeft.is_reliable());
        assert!(Command::Attack.is_reliable());
        assert!(Command::Say("hi".into()).is_reliable());
    }
}
