/// Declares an enum that maps every value of the integer type `$uxx`
///
/// Values without a named variant map to `Unknown`
macro_rules! full_range {
    ($uxx:ty,
        $(#[$enum_attr:meta])*
        pub enum $Enum:ident {
            $(
                $(#[$variant_attr:meta])*
                $Variant:ident = $value:expr,
            )+
        }
    ) => {
        $(#[$enum_attr])*
        pub enum $Enum {
            $(
                $(#[$variant_attr])*
                $Variant,
            )+
            /// A value without a name
            Unknown($uxx),
        }

        impl From<$uxx> for $Enum {
            fn from(value: $uxx) -> Self {
                $(
                    if value == $value {
                        return $Enum::$Variant;
                    }
                )+

                $Enum::Unknown(value)
            }
        }

        impl From<$Enum> for $uxx {
            fn from(value: $Enum) -> Self {
                match value {
                    $($Enum::$Variant => $value,)+
                    $Enum::Unknown(value) => value,
                }
            }
        }
    };
}

/// Extracts bit field `$field` (a module with `MASK` and `OFFSET` constants) from `$byte`
macro_rules! get {
    ($byte:expr, $field:ident) => {
        ($byte >> self::$field::OFFSET) & self::$field::MASK
    };
}

/// Overwrites bit field `$field` of `$byte` with the low bits of `$value`
macro_rules! set {
    ($byte:expr, $field:ident, $value:expr) => {{
        let mask = self::$field::MASK << self::$field::OFFSET;
        let byte = &mut $byte;

        *byte = (*byte & !mask) | (($value << self::$field::OFFSET) & mask);
    }};
}
