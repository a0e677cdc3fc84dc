/// Implements the explicit enum <-> wire string table for a fieldless enum.
///
/// The generated impls give `as_str`, `FromStr`, `Display` and the
/// `TryFrom<String>` / `From<T> for String` pair used by
/// `#[serde(try_from = "String", into = "String")]`.
macro_rules! wire_enum {
    ($ty:ident, $what:literal { $($variant:ident => $wire:literal),+ $(,)? }) => {
        impl $ty {
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($ty::$variant => $wire,)+
                }
            }
        }

        impl std::str::FromStr for $ty {
            type Err = String;

            fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
                match value {
                    $($wire => Ok($ty::$variant),)+
                    other => Err(format!("unknown {} `{}`", $what, other)),
                }
            }
        }

        impl TryFrom<String> for $ty {
            type Error = String;

            fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$ty> for String {
            fn from(value: $ty) -> Self {
                value.as_str().to_string()
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}
