//! Entity taxonomy and its flat record representation.
//!
//! Every discovered file is an [`Entity`] embedded by value in exactly one
//! concrete type: [`AudioMedia`], [`VideoMedia`] or [`Subtitles`]. The
//! [`Media`] and [`Support`] enums dispatch on [`Kind`].

mod kind;
mod model;
mod record;

pub use kind::{Class, Kind};
pub use model::*;
pub use record::{CLASS_KEY, KIND_KEY, Record, Recordable};
