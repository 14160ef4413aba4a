// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Structural introspection of runtime values.
//!
//! The recorder has to walk arbitrary object graphs the way the JVM-side dumper
//! walks them with reflection. Rust has no reflection, so types opt in through
//! the [`Inspect`] trait instead: a value exposes a borrowed [`Shape`] view of
//! itself and the serializer drives from there. Standard scalars and
//! containers are covered here; domain types implement the trait themselves.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::sync::Arc;

/// One position inside a composite shape. Introspection of an individual
/// field can fail (the Rust analog of a reflective access error) without
/// poisoning the rest of the object.
pub enum Slot<'a> {
    Value(&'a dyn Inspect),
    Error(String),
}

/// A borrowed, structural view of a value, produced by [`Inspect::inspect`].
pub enum Shape<'a> {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Char(char),
    Str(&'a str),
    /// An enum value, carried as its variant name.
    EnumVariant(&'a str),
    /// Ordered sequence: arrays, vectors, slices.
    Seq(Vec<Slot<'a>>),
    /// Map keyed by the stringified key, in iteration order.
    Map(Vec<(String, Slot<'a>)>),
    /// Plain object: declared fields in declaration order. The class name
    /// comes from [`Inspect::class_name`].
    Object(Vec<(&'a str, Slot<'a>)>),
}

/// Capability trait standing in for Java's unrestricted field reflection.
///
/// `inspect` is continuation-style rather than returning the shape so that
/// impls over interior-mutability containers can keep a borrow guard alive
/// while the view is consumed.
pub trait Inspect {
    /// Fully-qualified-ish name used as the `_type` discriminator.
    fn class_name(&self) -> &'static str;

    /// Reference identity for cycle detection. Smart pointers forward this to
    /// the pointee so that clones of one `Rc` compare identical. Only valid
    /// for comparison while the value is borrowed, which is all the
    /// serializer needs.
    fn identity(&self) -> usize;

    fn inspect(&self, probe: &mut dyn FnMut(Shape<'_>));
}

fn addr_of<T: ?Sized>(value: &T) -> usize {
    (value as *const T).cast::<()>().addr()
}

macro_rules! impl_inspect_scalar {
    ($variant:ident, $($t:ty => $conv:expr),* $(,)?) => {
        $(
            impl Inspect for $t {
                fn class_name(&self) -> &'static str {
                    std::any::type_name::<$t>()
                }
                fn identity(&self) -> usize {
                    addr_of(self)
                }
                fn inspect(&self, probe: &mut dyn FnMut(Shape<'_>)) {
                    #[allow(clippy::redundant_closure_call)]
                    probe(Shape::$variant(($conv)(*self)));
                }
            }
        )*
    };
}

impl_inspect_scalar!(Int,
    i8 => |v| i64::from(v),
    i16 => |v| i64::from(v),
    i32 => |v| i64::from(v),
    i64 => |v| v,
    isize => |v| v as i64,
);
impl_inspect_scalar!(UInt,
    u8 => |v| u64::from(v),
    u16 => |v| u64::from(v),
    u32 => |v| u64::from(v),
    u64 => |v| v,
    usize => |v| v as u64,
);
impl_inspect_scalar!(Float,
    f32 => |v| f64::from(v),
    f64 => |v| v,
);
impl_inspect_scalar!(Bool, bool => |v| v);
impl_inspect_scalar!(Char, char => |v| v);

impl Inspect for str {
    fn class_name(&self) -> &'static str {
        "str"
    }
    fn identity(&self) -> usize {
        addr_of(self)
    }
    fn inspect(&self, probe: &mut dyn FnMut(Shape<'_>)) {
        probe(Shape::Str(self));
    }
}

impl Inspect for String {
    fn class_name(&self) -> &'static str {
        "String"
    }
    fn identity(&self) -> usize {
        addr_of(self)
    }
    fn inspect(&self, probe: &mut dyn FnMut(Shape<'_>)) {
        probe(Shape::Str(self.as_str()));
    }
}

impl<T: Inspect + ?Sized> Inspect for &T {
    fn class_name(&self) -> &'static str {
        (**self).class_name()
    }
    fn identity(&self) -> usize {
        (**self).identity()
    }
    fn inspect(&self, probe: &mut dyn FnMut(Shape<'_>)) {
        (**self).inspect(probe);
    }
}

impl<T: Inspect + ?Sized> Inspect for Box<T> {
    fn class_name(&self) -> &'static str {
        (**self).class_name()
    }
    fn identity(&self) -> usize {
        (**self).identity()
    }
    fn inspect(&self, probe: &mut dyn FnMut(Shape<'_>)) {
        (**self).inspect(probe);
    }
}

impl<T: Inspect + ?Sized> Inspect for Rc<T> {
    fn class_name(&self) -> &'static str {
        (**self).class_name()
    }
    fn identity(&self) -> usize {
        (**self).identity()
    }
    fn inspect(&self, probe: &mut dyn FnMut(Shape<'_>)) {
        (**self).inspect(probe);
    }
}

impl<T: Inspect + ?Sized> Inspect for Arc<T> {
    fn class_name(&self) -> &'static str {
        (**self).class_name()
    }
    fn identity(&self) -> usize {
        (**self).identity()
    }
    fn inspect(&self, probe: &mut dyn FnMut(Shape<'_>)) {
        (**self).inspect(probe);
    }
}

impl<T: Inspect> Inspect for Option<T> {
    fn class_name(&self) -> &'static str {
        match self {
            Some(v) => v.class_name(),
            None => "null",
        }
    }
    fn identity(&self) -> usize {
        match self {
            Some(v) => v.identity(),
            None => addr_of(self),
        }
    }
    fn inspect(&self, probe: &mut dyn FnMut(Shape<'_>)) {
        match self {
            Some(v) => v.inspect(probe),
            None => probe(Shape::Null),
        }
    }
}

/// A `RefCell` already mutably borrowed elsewhere surfaces the per-field
/// error sentinel rather than panicking inside the trace path.
impl<T: Inspect> Inspect for RefCell<T> {
    fn class_name(&self) -> &'static str {
        match self.try_borrow() {
            Ok(inner) => inner.class_name(),
            Err(_) => std::any::type_name::<T>(),
        }
    }
    fn identity(&self) -> usize {
        match self.try_borrow() {
            Ok(inner) => inner.identity(),
            Err(_) => self.as_ptr().cast::<()>().addr(),
        }
    }
    fn inspect(&self, probe: &mut dyn FnMut(Shape<'_>)) {
        match self.try_borrow() {
            Ok(inner) => inner.inspect(probe),
            Err(_) => probe(Shape::Str(
                "[SERIALIZATION_ERROR: value is mutably borrowed]",
            )),
        }
    }
}

impl<T: Inspect> Inspect for [T] {
    fn class_name(&self) -> &'static str {
        std::any::type_name::<[T]>()
    }
    fn identity(&self) -> usize {
        addr_of(self)
    }
    fn inspect(&self, probe: &mut dyn FnMut(Shape<'_>)) {
        let items = self.iter().map(|v| Slot::Value(v as &dyn Inspect)).collect();
        probe(Shape::Seq(items));
    }
}

impl<T: Inspect, const N: usize> Inspect for [T; N] {
    fn class_name(&self) -> &'static str {
        std::any::type_name::<[T; N]>()
    }
    fn identity(&self) -> usize {
        addr_of(self)
    }
    fn inspect(&self, probe: &mut dyn FnMut(Shape<'_>)) {
        self.as_slice().inspect(probe);
    }
}

impl<T: Inspect> Inspect for Vec<T> {
    fn class_name(&self) -> &'static str {
        std::any::type_name::<Vec<T>>()
    }
    fn identity(&self) -> usize {
        addr_of(self)
    }
    fn inspect(&self, probe: &mut dyn FnMut(Shape<'_>)) {
        self.as_slice().inspect(probe);
    }
}

macro_rules! impl_inspect_map {
    ($($map:ident),*) => {
        $(
            impl<K: std::fmt::Display, V: Inspect> Inspect for $map<K, V> {
                fn class_name(&self) -> &'static str {
                    std::any::type_name::<Self>()
                }
                fn identity(&self) -> usize {
                    addr_of(self)
                }
                fn inspect(&self, probe: &mut dyn FnMut(Shape<'_>)) {
                    let entries = self
                        .iter()
                        .map(|(k, v)| (k.to_string(), Slot::Value(v as &dyn Inspect)))
                        .collect();
                    probe(Shape::Map(entries));
                }
            }
        )*
    };
}

impl_inspect_map!(HashMap, BTreeMap);

impl<K: std::fmt::Display, V: Inspect> Inspect for indexmap::IndexMap<K, V> {
    fn class_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
    fn identity(&self) -> usize {
        addr_of(self)
    }
    fn inspect(&self, probe: &mut dyn FnMut(Shape<'_>)) {
        let entries = self
            .iter()
            .map(|(k, v)| (k.to_string(), Slot::Value(v as &dyn Inspect)))
            .collect();
        probe(Shape::Map(entries));
    }
}
