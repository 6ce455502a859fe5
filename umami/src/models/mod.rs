mod event;
mod place;
mod record;
mod session;

pub use event::{Event, OutboundMessage, PromptChoice, StoreCard};
pub use place::{Candidate, GeoPoint, PlaceDetails, Review, StoreType};
pub use record::{EnrichedStore, RecordId, StoredRecord};
pub use session::{SessionMode, UserSession};
