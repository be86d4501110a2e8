//! Getter and setter capabilities registered on a [`Mapper`](crate::Mapper).
//!
//! A *provider* computes a value from a source record under a name, feeding
//! the destination field of that name. An *acceptor* takes a source field that
//! found no destination field and applies it to the destination record
//! through a typed setter.

use std::{any::Any, fmt};

use facet_core::{Facet, Shape};
use facet_reflect::{HeapValue, Partial, Peek, ReflectError};

use crate::CopyError;

/// Receives a computed value and reports whether it was written.
pub(crate) type Sink<'a> = dyn for<'v> FnMut(Peek<'v, 'static>) -> Result<bool, CopyError> + 'a;

type ProvideFn = dyn Fn(Peek<'_, 'static>, &mut Sink<'_>) -> Result<bool, CopyError> + Send + Sync;

type SetterFn = dyn Fn(&mut dyn Any, Peek<'_, 'static>) -> bool + Send + Sync;

type FinishFn = fn(
    HeapValue<'static>,
    &mut Partial<'static>,
    &mut dyn FnMut(&mut dyn Any),
) -> Result<(), ReflectError>;

/// A named, computed value on a source record.
pub(crate) struct Provider {
    shape: &'static Shape,
    name: &'static str,
    call: Box<ProvideFn>,
}

impl Provider {
    /// Computes the value from `source` and hands it to `sink`.
    pub(crate) fn provide(&self, source: Peek<'_, 'static>, sink: &mut Sink<'_>) -> Result<bool, CopyError> {
        log::trace!("Calling provider {} on {}", self.name, self.shape);
        (self.call)(source, sink)
    }
}

struct Setter {
    name: &'static str,
    call: Box<SetterFn>,
}

/// The setters registered for one destination record type.
pub(crate) struct Acceptor {
    shape: &'static Shape,
    setters: Vec<Setter>,
    finish: FinishFn,
}

impl Acceptor {
    /// Materializes the freshly built record, runs the setters matching
    /// `pending` on it and writes it into `partial`.
    pub(crate) fn finish(
        &self,
        built: HeapValue<'static>,
        partial: &mut Partial<'static>,
        pending: &[(&'static str, Peek<'_, 'static>)],
    ) -> Result<(), ReflectError> {
        (self.finish)(built, partial, &mut |record: &mut dyn Any| {
            for (name, value) in pending {
                let Some(setter) = self.setters.iter().rev().find(|s| s.name == *name) else {
                    continue;
                };
                if !(setter.call)(record, *value) {
                    log::trace!(
                        "Setter {name} on {} does not accept {}",
                        self.shape,
                        value.shape()
                    );
                }
            }
        })
    }
}

fn finish_record<D: Facet<'static> + 'static>(
    built: HeapValue<'static>,
    partial: &mut Partial<'static>,
    apply: &mut dyn FnMut(&mut dyn Any),
) -> Result<(), ReflectError> {
    let mut record: D = built.materialize()?;
    apply(&mut record);
    partial.set(record)?;
    Ok(())
}

/// Registry of providers and acceptors, looked up by record shape and name.
#[derive(Default)]
pub(crate) struct Hooks {
    providers: Vec<Provider>,
    acceptors: Vec<Acceptor>,
}

impl Hooks {
    pub(crate) fn add_provider<S, V, F>(&mut self, name: &'static str, getter: F)
    where
        S: Facet<'static> + 'static,
        V: Facet<'static> + 'static,
        F: Fn(&S) -> V + Send + Sync + 'static,
    {
        let call = move |source: Peek<'_, 'static>, sink: &mut Sink<'_>| {
            let Ok(source) = source.get::<S>() else {
                return Ok(false);
            };
            let value = getter(source);
            sink(Peek::new(&value))
        };
        self.providers.push(Provider {
            shape: S::SHAPE,
            name,
            call: Box::new(call),
        });
    }

    pub(crate) fn add_setter<D, V, F>(&mut self, name: &'static str, setter: F)
    where
        D: Facet<'static> + 'static,
        V: Facet<'static> + 'static,
        F: Fn(&mut D, &V) + Send + Sync + 'static,
    {
        let call = move |record: &mut dyn Any, value: Peek<'_, 'static>| {
            let (Some(record), Ok(value)) = (record.downcast_mut::<D>(), value.get::<V>()) else {
                return false;
            };
            setter(record, value);
            true
        };
        let setter = Setter {
            name,
            call: Box::new(call),
        };

        match self.acceptors.iter_mut().find(|a| a.shape == D::SHAPE) {
            Some(acceptor) => acceptor.setters.push(setter),
            None => self.acceptors.push(Acceptor {
                shape: D::SHAPE,
                setters: vec![setter],
                finish: finish_record::<D>,
            }),
        }
    }

    /// The most recently registered provider for `name` on `shape`.
    pub(crate) fn provider(&self, shape: &Shape, name: &str) -> Option<&Provider> {
        self.providers
            .iter()
            .rev()
            .find(|p| p.shape == shape && p.name == name)
    }

    pub(crate) fn acceptor(&self, shape: &Shape) -> Option<&Acceptor> {
        self.acceptors.iter().find(|a| a.shape == shape)
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let providers: Vec<String> = self
            .providers
            .iter()
            .map(|p| format!("{}::{}", p.shape, p.name))
            .collect();
        let setters: Vec<String> = self
            .acceptors
            .iter()
            .flat_map(|a| a.setters.iter().map(move |s| format!("{}::{}", a.shape, s.name)))
            .collect();
        f.debug_struct("Hooks")
            .field("providers", &providers)
            .field("setters", &setters)
            .finish()
    }
}
