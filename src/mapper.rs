use facet_core::Facet;
use facet_reflect::{Partial, Peek};

use crate::{
    CopyError,
    copier::{Action, Copier, classify},
    hooks::Hooks,
    resolve::{addressable, indirect},
};

/// Nesting limit used unless [`Mapper::with_max_depth`] says otherwise.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// A configured copier.
///
/// Holds the tag key used to match fields, the nesting limit and any getter
/// or setter hooks. The free functions [`copy`](crate::copy) and
/// [`copy_with_tag`](crate::copy_with_tag) use a default `Mapper`.
///
/// ```
/// use facet::Facet;
/// use facet_copy::Mapper;
///
/// #[derive(Facet)]
/// struct Account {
///     first: String,
///     last: String,
/// }
///
/// #[derive(Facet, Default)]
/// struct Summary {
///     full_name: String,
/// }
///
/// let mapper = Mapper::new().provide("full_name", |account: &Account| {
///     format!("{} {}", account.first, account.last)
/// });
///
/// let account = Account { first: "Ada".into(), last: "Lovelace".into() };
/// let mut summary = Summary::default();
/// mapper.copy(&mut summary, &account).unwrap();
/// assert_eq!(summary.full_name, "Ada Lovelace");
/// ```
#[derive(Debug)]
pub struct Mapper {
    tag: Option<String>,
    pub(crate) max_depth: usize,
    pub(crate) hooks: Hooks,
}

impl Default for Mapper {
    fn default() -> Self {
        Self {
            tag: None,
            max_depth: DEFAULT_MAX_DEPTH,
            hooks: Hooks::default(),
        }
    }
}

impl Mapper {
    /// A mapper that matches fields by name, with no hooks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Matches fields by the value of the `tag` attribute, as written in
    /// `#[facet(tag = "name")]`, falling back to the field name. An empty tag
    /// matches by name.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        self.tag = (!tag.is_empty()).then_some(tag);
        self
    }

    /// Limits how many records deep a copy may recurse.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Registers a getter: when copying from an `S`, the destination field
    /// matched by `name` is filled with the getter's result instead of a
    /// source field.
    ///
    /// If the result cannot be written into that field, the source field of
    /// the same name is used as usual.
    pub fn provide<S, V, F>(mut self, name: &'static str, getter: F) -> Self
    where
        S: Facet<'static> + 'static,
        V: Facet<'static> + 'static,
        F: Fn(&S) -> V + Send + Sync + 'static,
    {
        self.hooks.add_provider::<S, V, F>(name, getter);
        self
    }

    /// Registers a setter: when copying into a `D`, a source field matched by
    /// `name` that has no destination field is handed to `setter`, provided
    /// its type is `V`.
    pub fn accept<D, V, F>(mut self, name: &'static str, setter: F) -> Self
    where
        D: Facet<'static> + 'static,
        V: Facet<'static> + 'static,
        F: Fn(&mut D, &V) + Send + Sync + 'static,
    {
        self.hooks.add_setter::<D, V, F>(name, setter);
        self
    }

    /// The tag key fields are matched by; empty when matching by name.
    pub fn tag(&self) -> &str {
        self.tag.as_deref().unwrap_or("")
    }

    /// The configured nesting limit.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Copies `src` into `dest`.
    ///
    /// `dest` is only replaced once the whole copy has succeeded; on error it
    /// keeps its previous value.
    pub fn copy<D, S>(&self, dest: &mut D, src: &S) -> Result<(), CopyError>
    where
        D: Facet<'static>,
        S: Facet<'static>,
    {
        let slot = addressable(Peek::new(&*dest))?;
        let Some(source) = indirect(Peek::new(src)) else {
            log::trace!("Source {} is empty, nothing to copy", S::SHAPE);
            return Ok(());
        };
        if classify(slot.shape(), source.shape()) == Action::Skip {
            log::trace!("Nothing to copy from {} into {}", source.shape(), slot.shape());
            return Ok(());
        }

        log::trace!("Copying {} into {}", S::SHAPE, D::SHAPE);
        let copier = Copier::new(self);
        let mut typed = Partial::alloc::<D>()?;
        let built = match copier
            .copy_root(typed.inner_mut(), Peek::new(&*dest), source)
            .and_then(|()| Ok(typed.build()?))
        {
            Ok(built) => built,
            Err(err) => {
                copier.moves.abandon(typed);
                return Err(err);
            }
        };

        let was_at: *const D = &*dest;
        let old = std::mem::replace(dest, *built);
        copier.moves.release(old, was_at);
        Ok(())
    }
}
