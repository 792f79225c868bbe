//! Game-level enumerations and limits shared by both peers.

use crate::wire_enum;

pub const MAX_CLIENT_SAY_LENGTH: usize = 255;
pub const MAX_SERVER_SAY_LENGTH: usize = 255;
pub const MAX_SERVER_SAY_NAME_LENGTH: usize = 50;
pub const MAX_ACCOUNT_NAME_LENGTH: usize = 30;
pub const MAX_ACCOUNT_PASSWORD_LENGTH: usize = 30;
pub const MAX_ITEM_NAME_LENGTH: usize = 64;
pub const MAX_ITEM_DESCRIPTION_LENGTH: usize = 255;
pub const MAX_GAME_MESSAGE_PARAMS: usize = 8;

pub const INVENTORY_SIZE: u8 = 36;

/// Default size cap for one datagram on the unreliable channel.
pub const DEFAULT_MAX_UNRELIABLE_MESSAGE_SIZE: usize = 1200;

wire_enum! {
    pub enum StatType: 3 {
        Agi = 0,
        Int = 1,
        Str = 2,
        Def = 3,
        MaxHp = 4,
        MaxMp = 5,
        MinHit = 6,
        MaxHit = 7,
    }
}

impl StatType {
    /// Stats a player may raise by spending stat points.
    pub fn is_raisable(self) -> bool {
        matches!(
            self,
            StatType::Agi | StatType::Int | StatType::Str | StatType::Def
        )
    }
}

wire_enum! {
    pub enum EquipmentSlot: 2 {
        Head = 0,
        Body = 1,
        RightHand = 2,
        LeftHand = 3,
    }
}

wire_enum! {
    /// What a dynamic entity is, so the client knows how to mirror it.
    pub enum EntityKind: 2 {
        Character = 0,
        Item = 1,
        Usable = 2,
    }
}

wire_enum! {
    /// Player-visible messages. The client owns the text; the server only
    /// sends the identifier and its parameters.
    pub enum GameMessage: 4 {
        InvalidAccount = 0,
        AccountInUse = 1,
        InvalidSayText = 2,
        UnknownCommand = 3,
        WhoOnline = 4,
        NoStatPoints = 5,
        NoItemInSlot = 6,
        InventoryFull = 7,
        ItemUsed = 8,
        TooFarToPickup = 9,
    }
}

impl GameMessage {
    fn template(self) -> &'static str {
        match self {
            GameMessage::InvalidAccount => "Invalid account name or password.",
            GameMessage::AccountInUse => "The account `{0}` is already logged in.",
            GameMessage::InvalidSayText => "Chat text may only contain printable characters.",
            GameMessage::UnknownCommand => "Unknown command `{0}`.",
            GameMessage::WhoOnline => "Online users: {0}",
            GameMessage::NoStatPoints => "You have no stat points to spend.",
            GameMessage::NoItemInSlot => "There is no item in that slot.",
            GameMessage::InventoryFull => "Your inventory is full.",
            GameMessage::ItemUsed => "You used {0}.",
            GameMessage::TooFarToPickup => "That item is too far away.",
        }
    }

    /// Fills `{n}` placeholders with the given parameters. Missing
    /// parameters leave their placeholder untouched.
    pub fn format(self, params: &[String]) -> String {
        let mut text = self.template().to_string();
        for (i, param) in params.iter().enumerate() {
            text = text.replace(&format!("{{{i}}}"), param);
        }
        text
    }
}

/// True for text made only of printable ASCII characters.
pub fn is_valid_say_text(text: &str) -> bool {
    text.bytes().all(|b| (32..=126).contains(&b))
}
