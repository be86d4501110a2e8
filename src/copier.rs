//! The copy orchestrator: walks the destination shape through a `Partial`,
//! pulling values out of the source as it goes.

use std::collections::HashMap;

use facet_core::{Def, FieldFlags, Shape, Type, UserType};
use facet_reflect::{Partial, Peek};

use crate::{
    CopyError, CopyErrorKind, Mapper,
    coerce::{can_replicate, can_zero, replicate, retain, try_set, zero},
    fields::{NameTable, by_name, fields_of},
    hooks::Provider,
    moves::Moves,
    resolve::{
        element_shape, field_at, indirect, is_box_shape, is_record, is_sequence, option_value,
        pointee_value, slot_shape,
    },
};

type Result<T> = std::result::Result<T, CopyError>;

/// What copying a source into a destination amounts to, once both have been
/// stripped of their `Option` and `Box` layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    /// Same non-record type on both sides: assign the value as a whole.
    Assign,
    /// Records into a sequence of records: append one element per source.
    Expand,
    /// Record into record: copy matching fields.
    Fields,
    /// Nothing to do.
    Skip,
}

pub(crate) fn classify(dest: &'static Shape, source: &'static Shape) -> Action {
    let source_element = element_shape(source);
    if !is_record(source_element) && source == dest {
        return Action::Assign;
    }
    if !is_record(source_element) || !is_record(element_shape(dest)) {
        return Action::Skip;
    }
    if matches!(dest.def, Def::List(_)) {
        Action::Expand
    } else if is_record(dest) {
        Action::Fields
    } else {
        Action::Skip
    }
}

/// How the elements of a destination sequence hold their record.
#[derive(Debug, Clone, Copy)]
enum ItemForm {
    Value,
    Optional,
    Boxed,
}

impl ItemForm {
    fn of(item: &'static Shape) -> Option<Self> {
        if is_record(item) {
            return Some(ItemForm::Value);
        }
        match item.def {
            Def::Option(option_def) if is_record(option_def.t()) => Some(ItemForm::Optional),
            Def::Pointer(pointer_def)
                if is_box_shape(item) && pointer_def.pointee().is_some_and(is_record) =>
            {
                Some(ItemForm::Boxed)
            }
            _ => None,
        }
    }

    fn open(self, partial: &mut Partial<'static>) -> Result<()> {
        match self {
            ItemForm::Value => {}
            ItemForm::Optional => {
                partial.begin_some()?;
            }
            ItemForm::Boxed => {
                partial.begin_smart_ptr()?;
            }
        }
        Ok(())
    }

    fn close(self, partial: &mut Partial<'static>) -> Result<()> {
        if !matches!(self, ItemForm::Value) {
            partial.end()?;
        }
        Ok(())
    }
}

/// Where each destination field of a record gets its value from.
///
/// Built once per (destination record, source record) pair; a sequence copy
/// reuses it for every element.
struct FieldMap<'m> {
    /// Keyed by the destination field's path.
    links: HashMap<Vec<usize>, Link<'m>>,
    /// Source fields with no destination field, by match-name.
    unmatched: Vec<(&'static str, Vec<usize>)>,
}

#[derive(Default)]
struct Link<'m> {
    source: Option<Vec<usize>>,
    provider: Option<&'m Provider>,
}

impl<'m> FieldMap<'m> {
    fn build(mapper: &'m Mapper, dest: &'static Shape, source: &'static Shape) -> Self {
        let tag = mapper.tag();
        let dest_fields = fields_of(dest);
        let source_fields = fields_of(source);
        let targets = by_name(&dest_fields);
        let visible = by_name(&source_fields);
        let names = NameTable::build(&dest_fields, tag);

        let mut links: HashMap<Vec<usize>, Link<'m>> = HashMap::new();
        let mut unmatched = Vec::new();

        for field in &source_fields {
            // Shadowed by a shallower field of the same name.
            if visible.get(field.name).is_some_and(|v| v.path != field.path) {
                continue;
            }
            let match_name = field.match_name(tag);
            let target = names
                .lookup(match_name)
                .and_then(|name| targets.get(name));
            match target {
                Some(target) => {
                    links.entry(target.path.clone()).or_default().source = Some(field.path.clone());
                }
                None => unmatched.push((match_name, field.path.clone())),
            }
        }

        let source_record = element_shape(source);
        for field in &dest_fields {
            if targets.get(field.name).is_some_and(|t| t.path != field.path) {
                continue;
            }
            if let Some(provider) = mapper.hooks.provider(source_record, field.match_name(tag)) {
                links.entry(field.path.clone()).or_default().provider = Some(provider);
            }
        }

        log::trace!(
            "Mapped {} into {}: {} linked, {} unmatched",
            source,
            dest,
            links.len(),
            unmatched.len()
        );
        Self { links, unmatched }
    }
}

pub(crate) struct Copier<'m> {
    mapper: &'m Mapper,
    /// Values moved out of the old destination so far.
    pub(crate) moves: Moves,
}

impl<'m> Copier<'m> {
    pub(crate) fn new(mapper: &'m Mapper) -> Self {
        Self {
            mapper,
            moves: Moves::default(),
        }
    }

    fn retain(&self, partial: &mut Partial<'static>, prior: Option<Peek<'_, 'static>>) -> Result<()> {
        retain(partial, prior, &self.moves)
    }

    /// Copies into the top-level destination, whose `Option` and `Box`
    /// layers must already hold a value.
    pub(crate) fn copy_root(
        &self,
        partial: &mut Partial<'static>,
        prior: Peek<'_, 'static>,
        source: Peek<'_, 'static>,
    ) -> Result<()> {
        let shape = prior.shape();
        match shape.def {
            Def::Option(_) => {
                let inner = option_value(prior).ok_or(CopyErrorKind::Unaddressable(shape))?;
                partial.begin_some()?;
                self.copy_root(partial, inner, source)?;
                partial.end()?;
                Ok(())
            }
            Def::Pointer(_) if is_box_shape(shape) => {
                let inner = pointee_value(prior).ok_or(CopyErrorKind::Unaddressable(shape))?;
                partial.begin_smart_ptr()?;
                self.copy_root(partial, inner, source)?;
                partial.end()?;
                Ok(())
            }
            Def::Pointer(_) => Err(CopyErrorKind::Unaddressable(shape).into()),
            _ => self.copy_value(partial, Some(prior), source, 0),
        }
    }

    /// Copies `source` into the slot `partial` is positioned at, recursing
    /// into records and sequences.
    fn copy_value(
        &self,
        partial: &mut Partial<'static>,
        prior: Option<Peek<'_, 'static>>,
        source: Peek<'_, 'static>,
        depth: usize,
    ) -> Result<()> {
        let limit = self.mapper.max_depth;
        if depth > limit {
            return Err(CopyErrorKind::DepthExceeded { limit }.into());
        }
        let Some(source) = indirect(source) else {
            log::trace!("Empty source for {}, keeping value", partial.path());
            return self.retain(partial, prior);
        };

        let shape = partial.shape();
        let action = classify(slot_shape(shape), source.shape());
        if action == Action::Skip {
            log::trace!("Nothing to copy from {} into {}", source.shape(), shape);
            return self.retain(partial, prior);
        }

        // Nested optional and boxed slots are allocated on the way down.
        if let Def::Option(option_def) = shape.def {
            if prior.and_then(option_value).is_none() && !can_zero(slot_shape(option_def.t())) {
                log::trace!("Cannot build a fresh {} for {}", option_def.t(), partial.path());
                return self.retain(partial, prior);
            }
            partial.begin_some()?;
            self.copy_value(partial, prior.and_then(option_value), source, depth)?;
            partial.end()?;
            return Ok(());
        }
        if is_box_shape(shape) {
            partial.begin_smart_ptr()?;
            self.copy_value(partial, prior.and_then(pointee_value), source, depth)?;
            partial.end()?;
            return Ok(());
        }

        match action {
            Action::Assign => {
                log::trace!("Assigning {} directly", shape);
                if try_set(partial, prior, source, &self.moves)? {
                    return Ok(());
                }
                self.retain(partial, prior)
            }
            Action::Expand => self.expand(partial, prior, source, depth),
            Action::Fields => {
                let map = FieldMap::build(self.mapper, shape, source.shape());
                self.fill_record(partial, prior, source, &map, depth)
            }
            Action::Skip => self.retain(partial, prior),
        }
    }

    /// Appends one destination element per source element (or one for a
    /// single source record) after the sequence's existing elements.
    fn expand(
        &self,
        partial: &mut Partial<'static>,
        prior: Option<Peek<'_, 'static>>,
        source: Peek<'_, 'static>,
        depth: usize,
    ) -> Result<()> {
        let shape = partial.shape();
        let Def::List(list_def) = shape.def else {
            return self.retain(partial, prior);
        };
        let item = list_def.t();
        let Some(form) = ItemForm::of(item) else {
            log::trace!("Elements of {shape} cannot hold a record, dropping them");
            return self.retain(partial, prior);
        };
        let record = element_shape(item);
        if !can_zero(record) || !can_replicate(item, &mut Vec::new()) {
            log::trace!("Cannot build or copy elements of {shape}, keeping it");
            return self.retain(partial, prior);
        }

        let list = if is_sequence(source.shape()) {
            Some(source.into_list_like()?)
        } else {
            None
        };
        let sources: Vec<Option<Peek<'_, 'static>>> = match &list {
            Some(list) => list.iter().map(indirect).collect(),
            None => vec![Some(source)],
        };
        log::trace!(
            "Expanding {} source element(s) into {}",
            sources.len(),
            partial.path()
        );

        partial.begin_list()?;
        if let Some(prior) = prior {
            for existing in prior.into_list_like()?.iter() {
                partial.begin_list_item()?;
                replicate(partial, existing)?;
                partial.end()?;
            }
        }

        let mut map: Option<FieldMap<'m>> = None;
        for source in sources {
            partial.begin_list_item()?;
            form.open(partial)?;
            match source {
                Some(source) => {
                    let map = map
                        .get_or_insert_with(|| FieldMap::build(self.mapper, record, source.shape()));
                    self.fill_record(partial, None, source, map, depth + 1)?;
                }
                None => zero(partial)?,
            }
            form.close(partial)?;
            partial.end()?;
        }
        Ok(())
    }

    /// Writes one destination record, then runs any setters registered for
    /// its type on the source fields that found no destination field.
    fn fill_record(
        &self,
        partial: &mut Partial<'static>,
        prior: Option<Peek<'_, 'static>>,
        source: Peek<'_, 'static>,
        map: &FieldMap<'_>,
        depth: usize,
    ) -> Result<()> {
        let shape = partial.shape();
        let Some(acceptor) = self.mapper.hooks.acceptor(shape) else {
            return self.write_fields(partial, prior, source, map, &mut Vec::new(), depth);
        };

        let mut scratch = Partial::alloc_shape(shape)?;
        let built = match self
            .write_fields(&mut scratch, prior, source, map, &mut Vec::new(), depth)
            .and_then(|()| Ok(scratch.build()?))
        {
            Ok(built) => built,
            Err(err) => {
                self.moves.abandon(scratch);
                return Err(err);
            }
        };

        let pending: Vec<(&'static str, Peek<'_, 'static>)> = map
            .unmatched
            .iter()
            .filter_map(|(name, path)| field_at(source, path).map(|value| (*name, value)))
            .collect();
        acceptor.finish(built, partial, &pending)?;
        Ok(())
    }

    fn write_fields(
        &self,
        partial: &mut Partial<'static>,
        prior: Option<Peek<'_, 'static>>,
        source: Peek<'_, 'static>,
        map: &FieldMap<'_>,
        path: &mut Vec<usize>,
        depth: usize,
    ) -> Result<()> {
        let Type::User(UserType::Struct(struct_type)) = partial.shape().ty else {
            return self.retain(partial, prior);
        };
        let prior = prior.and_then(|p| p.into_struct().ok());

        for (index, field) in struct_type.fields.iter().enumerate() {
            path.push(index);
            let prior_field = prior.as_ref().and_then(|p| p.field(index).ok());
            partial.begin_nth_field(index)?;
            if field.flags.contains(FieldFlags::FLATTEN) && is_record(field.shape) {
                self.write_fields(partial, prior_field, source, map, path, depth)?;
            } else {
                let link = map.links.get(path.as_slice());
                self.write_field(partial, prior_field, source, link, depth)?;
            }
            partial.end()?;
            path.pop();
        }
        Ok(())
    }

    fn write_field(
        &self,
        partial: &mut Partial<'static>,
        prior: Option<Peek<'_, 'static>>,
        source: Peek<'_, 'static>,
        link: Option<&Link<'_>>,
        depth: usize,
    ) -> Result<()> {
        let Some(link) = link else {
            return self.retain(partial, prior);
        };

        if let Some(provider) = link.provider {
            let handled = provider.provide(source, &mut |value: Peek<'_, 'static>| {
                try_set(partial, prior, value, &self.moves)
            })?;
            if handled {
                return Ok(());
            }
        }

        let value = link
            .source
            .as_deref()
            .and_then(|path| field_at(source, path));
        match value {
            Some(value) => {
                if try_set(partial, prior, value, &self.moves)? {
                    return Ok(());
                }
                self.copy_value(partial, prior, value, depth + 1)
            }
            None => self.retain(partial, prior),
        }
    }
}
