/*++

Licensed under the Apache-2.0 license.

File Name:

    macros.rs

Abstract:

    Macros shared by the emulator crates.

--*/

/// Declares a field encoding as an enum. The trailing variant catches every
/// raw value that has no name and has no encoding of its own.
#[macro_export]
macro_rules! emu_enum {
    (
        $(#[$meta:meta])*
        $vis:vis $name:ident;
        $raw:ty;
        {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident = $code:literal,
            )*
        };
        $unknown:ident
    ) => {
        $(#[$meta])*
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant = $code,
            )*
            $unknown
        }

        impl $name {
            /// Raw field value, or `None` for the catch-all variant.
            pub fn encoding(self) -> Option<$raw> {
                match self {
                    $(Self::$variant => Some($code),)*
                    Self::$unknown => None,
                }
            }
        }

        impl From<$raw> for $name {
            fn from(raw: $raw) -> Self {
                match raw {
                    $($code => Self::$variant,)*
                    _ => Self::$unknown,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                let label = match self {
                    $(Self::$variant => stringify!($variant),)*
                    Self::$unknown => stringify!($unknown),
                };
                f.write_str(label)
            }
        }
    };
}
