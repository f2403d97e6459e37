/// Define an enumeration with known variants and an unknown representation.
///
/// Protocol number fields do not assign a meaning to every bit pattern. The generated enum keeps
/// unassigned values in an `Unknown` variant and converts losslessly from and to the underlying
/// integer.
// Copyright (C) 2016 whitequark@whitequark.org
macro_rules! enum_with_unknown {
    (
        $( #[$enum_attr:meta] )*
        pub enum $name:ident($ty:ty) {
            $(
              $( #[$variant_attr:meta] )*
              $variant:ident = $value:expr
            ),+ $(,)*
        }
    ) => {
        #[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
        $( #[$enum_attr] )*
        pub enum $name {
            $(
              $( #[$variant_attr] )*
              #[allow(missing_docs)]
              $variant
            ),*,
            /// A value without an assigned meaning.
            Unknown($ty)
        }

        impl ::core::convert::From<$ty> for $name {
            fn from(value: $ty) -> Self {
                match value {
                    $( $value => $name::$variant ),*,
                    other => $name::Unknown(other)
                }
            }
        }

        impl ::core::convert::From<$name> for $ty {
            fn from(value: $name) -> Self {
                match value {
                    $( $name::$variant => $value ),*,
                    $name::Unknown(other) => other
                }
            }
        }
    }
}

macro_rules! net_log {
    (trace, $($arg:tt)*) => { ::log::trace!(target: "ethox_tcp", $($arg)*) };
    (debug, $($arg:tt)*) => { ::log::debug!(target: "ethox_tcp", $($arg)*) };
    (warn, $($arg:tt)*) => { ::log::warn!(target: "ethox_tcp", $($arg)*) };
}

macro_rules! net_trace {
    ($($arg:tt)*) => (net_log!(trace, $($arg)*));
}

macro_rules! net_debug {
    ($($arg:tt)*) => (net_log!(debug, $($arg)*));
}

macro_rules! net_warn {
    ($($arg:tt)*) => (net_log!(warn, $($arg)*));
}
