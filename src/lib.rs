#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

use facet_core::Facet;

mod coerce;
mod copier;
mod error;
mod fields;
mod hooks;
mod mapper;
mod moves;
mod resolve;

pub use error::{CopyError, CopyErrorKind};
pub use fields::{FieldDescriptor, fields_of, resolve_tag_name};
pub use mapper::{DEFAULT_MAX_DEPTH, Mapper};

/// Copies the fields of `src` into `dest`, matching fields by name.
///
/// Fields of `dest` with no counterpart in `src`, or whose value cannot be
/// converted, keep their current value. Copying a record into a `Vec` of
/// records appends one element per source record.
pub fn copy<D, S>(dest: &mut D, src: &S) -> Result<(), CopyError>
where
    D: Facet<'static>,
    S: Facet<'static>,
{
    Mapper::new().copy(dest, src)
}

/// Like [`copy`], but matches fields by the value of their `tag` attribute,
/// e.g. `#[facet(api = "user_name")]` for the tag `"api"`. Fields without the
/// attribute match by name.
pub fn copy_with_tag<D, S>(dest: &mut D, src: &S, tag: &str) -> Result<(), CopyError>
where
    D: Facet<'static>,
    S: Facet<'static>,
{
    Mapper::new().with_tag(tag).copy(dest, src)
}
