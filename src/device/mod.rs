mod deck;
mod manager;
#[cfg(test)]
pub(crate) mod mock;
mod protocol;
mod selector;

pub use deck::{Deck, KeyCallback, KeyEvent};
pub use manager::MirajazzDeck;
pub use protocol::*;
pub use selector::{describe_decks, select};
