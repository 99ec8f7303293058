//! Trello grammar: cards (`/c/{id}`), boards (`/b/{id}`) and members.

use super::decode::{ambiguous, decode_unknown, Location};
use super::{Entity, Provider, TRELLO_HOST};
use crate::error::Result;

pub(super) fn decode(input: &str, _context: &Entity, force: bool) -> Result<Entity> {
    let mut location = Location::parse(input);
    if location.has_provider_scheme() || !location.has_web_scheme() {
        return decode_unknown(input);
    }

    location.take_host_from_path();
    if !location.host.is_empty() && location.host != TRELLO_HOST && !force {
        return decode_unknown(input);
    }

    // card and board urls carry a slug after the id, comments live in the fragment
    match location.segments().as_slice() {
        [] if location.fragment.is_empty() => Ok(Entity::service(Provider::Trello, TRELLO_HOST)),
        [] => Err(ambiguous(input)),
        ["c", id, ..] => Ok(Entity::trello_card(id)),
        ["b", id, ..] => Ok(Entity::trello_board(id)),
        ["c"] | ["b"] => Err(ambiguous(input)),
        [user, ..] => match user.trim_start_matches('@') {
            "" => Err(ambiguous(input)),
            user => Ok(Entity::trello_user(user)),
        },
    }
}
