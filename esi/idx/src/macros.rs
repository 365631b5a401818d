#[macro_export]
/// This macro is used to implement the IndexRef trait for a type that wraps an
/// unsigned integer value. By default, the macro will implement the trait using
/// a [`u32`](std::u32) as the backing type. However, if a different backing type
/// is desired, it can be specified as the second argument.
macro_rules! impl_index {
    ($struct_name: ident) => {
        $crate::impl_index!($struct_name, u32);
    };

    ($struct_name: ident, $backing_ty: ty) => {
        impl $crate::IndexRef for $struct_name {
            fn index(&self) -> usize {
                self.0 as usize
            }

            fn new(input: usize) -> Self {
                Self(input as $backing_ty)
            }
        }

        impl From<usize> for $struct_name {
            fn from(input: usize) -> Self {
                $crate::IndexRef::new(input)
            }
        }
    };
}
