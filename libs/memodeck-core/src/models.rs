//! Entity model: User, Deck, DeckAccess, Card, ScheduledCard, View.
//!
//! Entities are plain records keyed by opaque strings. Each carries its key
//! (absent until first persist), a parent back-reference used only for path
//! composition, and a `persisted` flag backing the `exists()` predicate.
//! Key, parent, and the flag never appear in the serialized node.
//!
//! Parent links are value types resolved by key, never held references, so
//! the in-memory graph has no cycles. Ownership flows top-down: a Deck owns
//! its Cards, a Card owns its ScheduledCard and Views.

use crate::error::{ModelError, Result};
use crate::path::TreePath;
use crate::types::{Level, Node, Reply, Timestamp};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Reference to a user root, `users/{uid}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRef {
    pub uid: String,
}

impl UserRef {
    pub fn new(uid: impl Into<String>) -> Self {
        Self { uid: uid.into() }
    }

    /// Path of the user record itself.
    pub fn root(&self) -> Result<TreePath> {
        TreePath::new(["users", self.uid.as_str()])
    }

    fn collection(&self, name: &str) -> Result<TreePath> {
        self.root()?.child(name)
    }
}

/// Reference to a deck under a user, resolving every per-deck collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeckRef {
    pub user: UserRef,
    pub deck_key: String,
}

impl DeckRef {
    pub fn new(user: UserRef, deck_key: impl Into<String>) -> Self {
        Self {
            user,
            deck_key: deck_key.into(),
        }
    }

    /// `users/{uid}/decks/{deckKey}`
    pub fn path(&self) -> Result<TreePath> {
        self.user.collection("decks")?.child(&self.deck_key)
    }

    /// `users/{uid}/deck_access/{deckKey}`
    pub fn access(&self) -> Result<TreePath> {
        self.user.collection("deck_access")?.child(&self.deck_key)
    }

    /// `users/{uid}/cards/{deckKey}`
    pub fn cards(&self) -> Result<TreePath> {
        self.user.collection("cards")?.child(&self.deck_key)
    }

    /// `users/{uid}/learning/{deckKey}`
    pub fn learning(&self) -> Result<TreePath> {
        self.user.collection("learning")?.child(&self.deck_key)
    }

    /// `users/{uid}/views/{deckKey}`
    pub fn views(&self) -> Result<TreePath> {
        self.user.collection("views")?.child(&self.deck_key)
    }
}

/// Reference to a card within a deck; parent of its Views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardRef {
    pub deck: DeckRef,
    pub card_key: String,
}

impl CardRef {
    pub fn new(deck: DeckRef, card_key: impl Into<String>) -> Self {
        Self {
            deck,
            card_key: card_key.into(),
        }
    }

    /// `users/{uid}/views/{deckKey}/{cardKey}`, the card's Views subtree.
    pub fn views(&self) -> Result<TreePath> {
        self.deck.views()?.child(&self.card_key)
    }
}

/// A Card's parent: the Deck at construction time, or the paired
/// ScheduledCard once the two are linked. The canonical card path is the
/// same through either tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardParent {
    Deck(DeckRef),
    Scheduled { deck: DeckRef, card_key: String },
}

impl CardParent {
    pub fn deck(&self) -> &DeckRef {
        match self {
            CardParent::Deck(deck) => deck,
            CardParent::Scheduled { deck, .. } => deck,
        }
    }
}

/// Common behaviour of every persistable record.
pub trait Entity: Serialize {
    /// Entity name used in error reporting.
    const KIND: &'static str;

    /// The assigned key, if any.
    fn key(&self) -> Option<&str>;

    /// Assign a freshly allocated key. Overwriting an existing key is a
    /// programmer error and panics in debug builds.
    fn assign_key(&mut self, key: String);

    /// True iff the entity has a key and was loaded from the store or has
    /// been persisted at least once in this session.
    fn exists(&self) -> bool;

    /// Record a successful persist.
    fn mark_persisted(&mut self);

    /// Path of the collection this entity lives in, derived from the parent.
    fn collection(&self) -> Result<TreePath>;

    /// Canonical path of this entity.
    fn path(&self) -> Result<TreePath> {
        let key = self.key().ok_or(ModelError::MissingKey {
            entity: Self::KIND,
        })?;
        self.collection()?.child(key)
    }

    /// Serialize the attribute bag to a tree node. Fails on an unkeyed or
    /// unparented entity.
    fn to_node(&self) -> Result<Node> {
        if self.key().is_none() {
            return Err(ModelError::MissingKey {
                entity: Self::KIND,
            });
        }
        self.collection()?;
        Ok(serde_json::to_value(self)?)
    }
}

fn decode<T: DeserializeOwned>(node: Node) -> Result<T> {
    Ok(serde_json::from_value(node)?)
}

/// A user account; keyed by uid at the store root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(skip)]
    key: Option<String>,
    #[serde(skip)]
    persisted: bool,
    pub display_name: String,
}

impl User {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            key: None,
            persisted: false,
            display_name: display_name.into(),
        }
    }

    pub fn from_node(uid: impl Into<String>, node: Node) -> Result<Self> {
        let mut user: User = decode(node)?;
        user.key = Some(uid.into());
        user.persisted = true;
        Ok(user)
    }

    /// Reference to this user's root; requires a key.
    pub fn user_ref(&self) -> Result<UserRef> {
        let uid = self.key().ok_or(ModelError::MissingKey {
            entity: Self::KIND,
        })?;
        Ok(UserRef::new(uid))
    }
}

impl Entity for User {
    const KIND: &'static str = "User";

    fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    fn assign_key(&mut self, key: String) {
        debug_assert!(self.key.is_none(), "User key reassigned");
        self.key = Some(key);
    }

    fn exists(&self) -> bool {
        self.key.is_some() && self.persisted
    }

    fn mark_persisted(&mut self) {
        self.persisted = true;
    }

    fn collection(&self) -> Result<TreePath> {
        TreePath::new(["users"])
    }
}

/// Category of a deck; drives client-side card decoration only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeckType {
    Basic,
    German,
    Swiss,
}

impl Default for DeckType {
    fn default() -> Self {
        DeckType::Basic
    }
}

/// A named collection of cards owned by a user, possibly shared.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deck {
    #[serde(skip)]
    key: Option<String>,
    #[serde(skip)]
    parent: Option<UserRef>,
    #[serde(skip)]
    persisted: bool,
    pub name: String,
    pub deck_type: DeckType,
    pub accepted: bool,
    pub last_sync_at: i64,
}

impl Deck {
    pub fn new(owner: UserRef, name: impl Into<String>, deck_type: DeckType) -> Self {
        Self {
            key: None,
            parent: Some(owner),
            persisted: false,
            name: name.into(),
            deck_type,
            accepted: true,
            last_sync_at: 0,
        }
    }

    pub fn from_node(owner: UserRef, key: impl Into<String>, node: Node) -> Result<Self> {
        let mut deck: Deck = decode(node)?;
        deck.key = Some(key.into());
        deck.parent = Some(owner);
        deck.persisted = true;
        Ok(deck)
    }

    pub fn user(&self) -> Result<&UserRef> {
        self.parent.as_ref().ok_or(ModelError::MissingParent {
            entity: Self::KIND,
        })
    }

    /// Reference to this deck; requires a key.
    pub fn deck_ref(&self) -> Result<DeckRef> {
        let key = self.key().ok_or(ModelError::MissingKey {
            entity: Self::KIND,
        })?;
        Ok(DeckRef::new(self.user()?.clone(), key))
    }
}

impl Entity for Deck {
    const KIND: &'static str = "Deck";

    fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    fn assign_key(&mut self, key: String) {
        debug_assert!(self.key.is_none(), "Deck key reassigned");
        self.key = Some(key);
    }

    fn exists(&self) -> bool {
        self.key.is_some() && self.persisted
    }

    fn mark_persisted(&mut self) {
        self.persisted = true;
    }

    fn collection(&self) -> Result<TreePath> {
        self.user()?.collection("decks")
    }
}

/// Access granted to a user on a deck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    Owner,
    Writer,
    Reader,
}

/// One user's access record on a deck; keyed by the grantee's uid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckAccess {
    #[serde(skip)]
    key: Option<String>,
    #[serde(skip)]
    parent: Option<DeckRef>,
    #[serde(skip)]
    persisted: bool,
    pub access: AccessLevel,
}

impl DeckAccess {
    pub fn new(deck: DeckRef, grantee_uid: impl Into<String>, access: AccessLevel) -> Self {
        Self {
            key: Some(grantee_uid.into()),
            parent: Some(deck),
            persisted: false,
            access,
        }
    }

    pub fn from_node(deck: DeckRef, grantee_uid: impl Into<String>, node: Node) -> Result<Self> {
        let mut record: DeckAccess = decode(node)?;
        record.key = Some(grantee_uid.into());
        record.parent = Some(deck);
        record.persisted = true;
        Ok(record)
    }

    pub fn deck(&self) -> Result<&DeckRef> {
        self.parent.as_ref().ok_or(ModelError::MissingParent {
            entity: Self::KIND,
        })
    }
}

impl Entity for DeckAccess {
    const KIND: &'static str = "DeckAccess";

    fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    fn assign_key(&mut self, key: String) {
        debug_assert!(self.key.is_none(), "DeckAccess key reassigned");
        self.key = Some(key);
    }

    fn exists(&self) -> bool {
        self.key.is_some() && self.persisted
    }

    fn mark_persisted(&mut self) {
        self.persisted = true;
    }

    fn collection(&self) -> Result<TreePath> {
        self.deck()?.access()
    }
}

/// A front/back text pair belonging to a deck.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    #[serde(skip)]
    key: Option<String>,
    #[serde(skip)]
    parent: Option<CardParent>,
    #[serde(skip)]
    persisted: bool,
    pub front: String,
    pub back: String,
    pub created_at: Timestamp,
}

impl Card {
    /// A fresh card with a Deck parent. `createdAt` stays the server token
    /// until the store materializes it.
    pub fn new(deck: DeckRef, front: impl Into<String>, back: impl Into<String>) -> Self {
        Self {
            key: None,
            parent: Some(CardParent::Deck(deck)),
            persisted: false,
            front: front.into(),
            back: back.into(),
            created_at: Timestamp::Server,
        }
    }

    pub fn from_node(deck: DeckRef, key: impl Into<String>, node: Node) -> Result<Self> {
        let mut card: Card = decode(node)?;
        card.key = Some(key.into());
        card.parent = Some(CardParent::Deck(deck));
        card.persisted = true;
        Ok(card)
    }

    pub fn parent(&self) -> Result<&CardParent> {
        self.parent.as_ref().ok_or(ModelError::MissingParent {
            entity: Self::KIND,
        })
    }

    /// The deck this card belongs to, directly or via its ScheduledCard.
    pub fn deck(&self) -> Result<&DeckRef> {
        Ok(self.parent()?.deck())
    }

    /// Re-tag the parent as the paired ScheduledCard once keys are linked.
    pub fn link_scheduled(&mut self, card_key: impl Into<String>) -> Result<()> {
        let deck = self.deck()?.clone();
        self.parent = Some(CardParent::Scheduled {
            deck,
            card_key: card_key.into(),
        });
        Ok(())
    }

    /// Reference used to key this card's Views.
    pub fn card_ref(&self) -> Result<CardRef> {
        let key = self.key().ok_or(ModelError::MissingKey {
            entity: Self::KIND,
        })?;
        Ok(CardRef::new(self.deck()?.clone(), key))
    }

    /// Path of the paired ScheduledCard (same key, `learning` collection).
    pub fn scheduled_path(&self) -> Result<TreePath> {
        let key = self.key().ok_or(ModelError::MissingKey {
            entity: Self::KIND,
        })?;
        self.deck()?.learning()?.child(key)
    }

    /// Path of this card's Views subtree.
    pub fn views_path(&self) -> Result<TreePath> {
        self.card_ref()?.views()
    }
}

impl Entity for Card {
    const KIND: &'static str = "Card";

    fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    fn assign_key(&mut self, key: String) {
        debug_assert!(self.key.is_none(), "Card key reassigned");
        self.key = Some(key);
    }

    fn exists(&self) -> bool {
        self.key.is_some() && self.persisted
    }

    fn mark_persisted(&mut self) {
        self.persisted = true;
    }

    fn collection(&self) -> Result<TreePath> {
        self.deck()?.cards()
    }
}

/// Schedule state paired with a card. Keyed identically to its Card under
/// the same deck.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledCard {
    #[serde(skip)]
    key: Option<String>,
    #[serde(skip)]
    parent: Option<DeckRef>,
    #[serde(skip)]
    persisted: bool,
    pub level: Level,
    pub repeat_at: i64,
}

impl ScheduledCard {
    pub fn new(deck: DeckRef, level: Level, repeat_at: i64) -> Self {
        Self {
            key: None,
            parent: Some(deck),
            persisted: false,
            level,
            repeat_at,
        }
    }

    pub fn from_node(deck: DeckRef, key: impl Into<String>, node: Node) -> Result<Self> {
        let mut scheduled: ScheduledCard = decode(node)?;
        scheduled.key = Some(key.into());
        scheduled.parent = Some(deck);
        scheduled.persisted = true;
        Ok(scheduled)
    }

    pub fn deck(&self) -> Result<&DeckRef> {
        self.parent.as_ref().ok_or(ModelError::MissingParent {
            entity: Self::KIND,
        })
    }
}

impl Entity for ScheduledCard {
    const KIND: &'static str = "ScheduledCard";

    fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    fn assign_key(&mut self, key: String) {
        debug_assert!(self.key.is_none(), "ScheduledCard key reassigned");
        self.key = Some(key);
    }

    fn exists(&self) -> bool {
        self.key.is_some() && self.persisted
    }

    fn mark_persisted(&mut self) {
        self.persisted = true;
    }

    fn collection(&self) -> Result<TreePath> {
        self.deck()?.learning()
    }
}

/// A durable record of one answer event on a card.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct View {
    #[serde(skip)]
    key: Option<String>,
    #[serde(skip)]
    parent: Option<CardRef>,
    #[serde(skip)]
    persisted: bool,
    pub level_before: Level,
    pub reply: Reply,
    pub created_at: Timestamp,
}

impl View {
    pub fn new(card: CardRef, level_before: Level, reply: Reply) -> Self {
        Self {
            key: None,
            parent: Some(card),
            persisted: false,
            level_before,
            reply,
            created_at: Timestamp::Server,
        }
    }

    pub fn from_node(card: CardRef, key: impl Into<String>, node: Node) -> Result<Self> {
        let mut view: View = decode(node)?;
        view.key = Some(key.into());
        view.parent = Some(card);
        view.persisted = true;
        Ok(view)
    }

    pub fn card(&self) -> Result<&CardRef> {
        self.parent.as_ref().ok_or(ModelError::MissingParent {
            entity: Self::KIND,
        })
    }
}

impl Entity for View {
    const KIND: &'static str = "View";

    fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    fn assign_key(&mut self, key: String) {
        debug_assert!(self.key.is_none(), "View key reassigned");
        self.key = Some(key);
    }

    fn exists(&self) -> bool {
        self.key.is_some() && self.persisted
    }

    fn mark_persisted(&mut self) {
        self.persisted = true;
    }

    fn collection(&self) -> Result<TreePath> {
        self.card()?.views()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn deck_ref() -> DeckRef {
        DeckRef::new(UserRef::new("u1"), "d1")
    }

    #[test]
    fn fresh_card_does_not_exist() {
        let card = Card::new(deck_ref(), "hola", "hello");
        assert!(!card.exists());
        assert_eq!(card.key(), None);
    }

    #[test]
    fn keyed_but_unpersisted_card_does_not_exist() {
        let mut card = Card::new(deck_ref(), "hola", "hello");
        card.assign_key("c1".into());
        assert!(!card.exists());
        card.mark_persisted();
        assert!(card.exists());
    }

    #[test]
    fn loaded_card_exists() {
        let card = Card::from_node(
            deck_ref(),
            "c1",
            json!({"front": "a", "back": "b", "createdAt": 1_700_000_000_000i64}),
        )
        .unwrap();
        assert!(card.exists());
    }

    #[test]
    fn card_path_through_deck_parent() {
        let mut card = Card::new(deck_ref(), "hola", "hello");
        card.assign_key("c1".into());
        assert_eq!(card.path().unwrap().join(), "users/u1/cards/d1/c1");
    }

    #[test]
    fn card_path_unchanged_after_scheduled_link() {
        let mut card = Card::new(deck_ref(), "hola", "hello");
        card.assign_key("c1".into());
        card.link_scheduled("c1").unwrap();
        assert_eq!(card.path().unwrap().join(), "users/u1/cards/d1/c1");
        assert!(matches!(
            card.parent().unwrap(),
            CardParent::Scheduled { .. }
        ));
    }

    #[test]
    fn user_record_keyed_by_uid_at_root() {
        let user = User::from_node("u1", json!({"displayName": "Kat"})).unwrap();
        assert_eq!(user.path().unwrap().join(), "users/u1");
        assert_eq!(user.display_name, "Kat");
        assert_eq!(user.user_ref().unwrap(), UserRef::new("u1"));
        assert_eq!(user.to_node().unwrap(), json!({"displayName": "Kat"}));
    }

    #[test]
    fn entity_paths_follow_persisted_layout() {
        let owner = UserRef::new("u1");

        let mut deck = Deck::new(owner.clone(), "Spanish", DeckType::Basic);
        deck.assign_key("d1".into());
        assert_eq!(deck.path().unwrap().join(), "users/u1/decks/d1");

        let access = DeckAccess::new(deck.deck_ref().unwrap(), "u2", AccessLevel::Reader);
        assert_eq!(
            access.path().unwrap().join(),
            "users/u1/deck_access/d1/u2"
        );

        let mut scheduled = ScheduledCard::new(deck_ref(), Level::L0, 42);
        scheduled.assign_key("c1".into());
        assert_eq!(
            scheduled.path().unwrap().join(),
            "users/u1/learning/d1/c1"
        );

        let mut view = View::new(CardRef::new(deck_ref(), "c1"), Level::L2, Reply::Y);
        view.assign_key("v1".into());
        assert_eq!(view.path().unwrap().join(), "users/u1/views/d1/c1/v1");
    }

    #[test]
    fn to_node_excludes_key_and_parent() {
        let mut deck = Deck::new(UserRef::new("u1"), "Spanish", DeckType::German);
        deck.assign_key("d1".into());
        let node = deck.to_node().unwrap();
        assert_eq!(
            node,
            json!({
                "name": "Spanish",
                "deckType": "GERMAN",
                "accepted": true,
                "lastSyncAt": 0,
            })
        );
    }

    #[test]
    fn to_node_fails_without_key() {
        let card = Card::new(deck_ref(), "a", "b");
        assert!(matches!(
            card.to_node().unwrap_err(),
            ModelError::MissingKey { entity: "Card" }
        ));
    }

    #[test]
    fn serialize_deserialize_is_identity_on_attributes() {
        let mut card = Card::new(deck_ref(), "hola", "hello");
        card.assign_key("c1".into());
        card.created_at = Timestamp::At(1_700_000_000_000);

        let node = card.to_node().unwrap();
        let restored = Card::from_node(deck_ref(), "c1", node).unwrap();
        assert_eq!(restored.front, card.front);
        assert_eq!(restored.back, card.back);
        assert_eq!(restored.created_at, card.created_at);
    }

    #[test]
    fn scheduled_card_round_trip() {
        let mut scheduled = ScheduledCard::new(deck_ref(), Level::L4, 1_699_000_000_000);
        scheduled.assign_key("c1".into());
        let node = scheduled.to_node().unwrap();
        assert_eq!(node, json!({"level": "L4", "repeatAt": 1_699_000_000_000i64}));

        let restored = ScheduledCard::from_node(deck_ref(), "c1", node).unwrap();
        assert_eq!(restored.level, Level::L4);
        assert_eq!(restored.repeat_at, 1_699_000_000_000);
        assert!(restored.exists());
    }

    #[test]
    fn view_node_uses_wire_codes() {
        let mut view = View::new(CardRef::new(deck_ref(), "c1"), Level::L5, Reply::N);
        view.assign_key("v1".into());
        let node = view.to_node().unwrap();
        assert_eq!(
            node,
            json!({
                "levelBefore": "L5",
                "reply": "N",
                "createdAt": { ".sv": "timestamp" },
            })
        );
    }

    #[test]
    fn access_levels_are_lowercase() {
        assert_eq!(
            serde_json::to_value(AccessLevel::Owner).unwrap(),
            json!("owner")
        );
    }
}
