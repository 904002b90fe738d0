//! Integer-backed identifier types.
//!
//! # Example
//!
//! ```
//! kernel::int_like!(Pid, usize);
//!
//! const INIT: Pid = Pid::new(1);
//! assert_eq!(usize::from(INIT), 1);
//! ```
//!
//! The four-argument form also defines an atomic holder, used as an identifier counter:
//!
//! ```
//! use core::sync::atomic::Ordering;
//!
//! kernel::int_like!(Pid, AtomicPid, usize, AtomicUsize);
//!
//! let next = AtomicPid::new(Pid::new(1));
//! assert_eq!(next.fetch_add(Pid::new(1), Ordering::Relaxed), Pid::new(1));
//! assert_eq!(next.load(Ordering::Relaxed), Pid::new(2));
//! ```

#[macro_export]
macro_rules! int_like {
    ($new_type_name:ident, $backing_type: ident) => {
        #[derive(Default, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy)]
        pub struct $new_type_name($backing_type);

        impl $new_type_name {
            #[allow(dead_code)]
            #[inline]
            pub const fn get(self) -> $backing_type {
                self.0
            }
            #[allow(dead_code)]
            #[inline]
            pub const fn new(x: $backing_type) -> Self {
                $new_type_name(x)
            }
        }

        impl ::core::convert::From<$backing_type> for $new_type_name {
            #[inline]
            fn from(inner: $backing_type) -> Self {
                Self::new(inner)
            }
        }
        impl ::core::convert::From<$new_type_name> for $backing_type {
            #[inline]
            fn from(wrapped: $new_type_name) -> Self {
                wrapped.get()
            }
        }
        impl ::core::fmt::Display for $new_type_name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                ::core::fmt::Display::fmt(&self.0, f)
            }
        }
    };

    (
        $new_type_name:ident,
        $new_atomic_type_name: ident,
        $backing_type:ident,
        $backing_atomic_type:ident
    ) => {
        $crate::int_like!($new_type_name, $backing_type);

        /// Runtime equivalent to the backing atomic, just type-safer.
        pub struct $new_atomic_type_name {
            container: ::core::sync::atomic::$backing_atomic_type,
        }

        impl $new_atomic_type_name {
            #[allow(dead_code)]
            #[inline]
            pub const fn new(x: $new_type_name) -> Self {
                $new_atomic_type_name {
                    container: ::core::sync::atomic::$backing_atomic_type::new(x.get()),
                }
            }
            #[allow(dead_code)]
            #[inline]
            pub fn load(&self, order: ::core::sync::atomic::Ordering) -> $new_type_name {
                $new_type_name::from(self.container.load(order))
            }
            #[allow(dead_code)]
            #[inline]
            pub fn store(&self, val: $new_type_name, order: ::core::sync::atomic::Ordering) {
                self.container.store(val.into(), order)
            }
            #[allow(dead_code)]
            #[inline]
            pub fn fetch_add(
                &self,
                with: $new_type_name,
                order: ::core::sync::atomic::Ordering,
            ) -> $new_type_name {
                $new_type_name::from(self.container.fetch_add(with.into(), order))
            }
        }
        impl ::core::default::Default for $new_atomic_type_name {
            #[inline]
            fn default() -> Self {
                Self::new($new_type_name::new(0))
            }
        }
    };
}

#[test]
fn test() {
    use core::mem::size_of;
    use core::sync::atomic::AtomicUsize;

    int_like!(UsizeLike, usize);
    assert_eq!(size_of::<UsizeLike>(), size_of::<usize>());

    int_like!(UsizeLike2, AtomicUsizeLike, usize, AtomicUsize);
    assert_eq!(size_of::<UsizeLike2>(), size_of::<usize>());
    assert_eq!(size_of::<AtomicUsizeLike>(), size_of::<AtomicUsize>());
}
