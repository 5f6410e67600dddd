/// Declares a fieldless enum whose variants are stored as integer codes in serialized graphs.
///
/// Every variant is listed with its canonical code, optionally followed by legacy aliases
/// (`Variant = 6 | 2`). The mapping is closed: `from_wire` returns `None` for any code that is
/// not listed, and `decode` turns that into an invalid parameter error.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident: $repr:ty {
            $(
                $(#[$vmeta:meta])*
                $variant:ident = $code:literal $(| $alias:literal)*
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        $vis enum $name {
            $(
                $(#[$vmeta])*
                $variant,
            )+
        }

        impl $name {
            pub const fn wire_code(self) -> $repr {
                match self {
                    $(Self::$variant => $code,)+
                }
            }

            pub fn from_wire(code: $repr) -> Option<Self> {
                match code {
                    $($code $(| $alias)* => Some(Self::$variant),)+
                    _ => None,
                }
            }

            #[allow(dead_code)]
            pub(crate) fn decode(code: $repr) -> $crate::error::Result<Self> {
                Self::from_wire(code).ok_or_else(|| {
                    $crate::error::DeserializeError::invalid_parameter(format!(
                        "unknown {} value {}",
                        stringify!($name),
                        code
                    ))
                })
            }
        }
    };
}
