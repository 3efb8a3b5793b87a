use proc_macro::TokenStream;
use proc_macro_crate::{FoundCrate, crate_name};
use quote::quote;
use syn::{
    Attribute, Data, DeriveInput, Error, Fields, GenericArgument, Ident, PathArguments, ReturnType,
    Type, TypePath, parse_macro_input, spanned::Spanned,
};

/// Derive macro for the `Payload` trait.
///
/// This macro generates an implementation of `Payload` after verifying at
/// compile time that a type can be copied byte-for-byte into a message
/// envelope and read back by the consuming thread.
///
/// # Compile-Time Checks
///
/// 1. **Stable layout**: structs need `#[repr(C)]` or `#[repr(transparent)]`,
///    fieldless enums need an integer repr such as `#[repr(u8)]`.
///
/// 2. **Plain data**: enums with fields and unions are rejected, as are field
///    types that borrow or own other memory:
///    - References: `&T`, `&mut T`
///    - Heap allocations: `Vec`, `Box`, `String`, `PathBuf`, `OsString`, `CString`
///    - Reference counting: `Rc`, `Arc`
///    - Locks: `Mutex`, `RwLock`, `Condvar`, `Barrier`
///
///    Raw pointers are allowed; a null one is reported through
///    `Payload::is_null` when the envelope is built.
///
/// 3. **Recursive safety**: all fields must themselves implement `Payload`.
///    This is enforced via generated where clauses.
///
/// 4. **Size and padding**: the type must fit in `MAX_PAYLOAD_SIZE` bytes
///    and its size must equal the sum of its field sizes, so no
///    uninitialized padding byte is ever copied. Non-generic types are
///    checked where they are defined; generic ones when a message is built
///    from a concrete instantiation.
///
/// # Example
///
/// ```
/// # use lfmq::Payload;
/// #[derive(Payload, Clone, Copy)]
/// #[repr(C)]
/// struct Crossfade {
///     from_frame: u64,
///     to_frame: u64,
///     curve: [f32; 4],
/// }
///
/// // Extra alignment is fine as long as it adds no tail padding.
/// #[derive(Payload, Clone, Copy)]
/// #[repr(C, align(8))]
/// struct Cursor {
///     frame: u64,
/// }
///
/// let msg = lfmq::Message::new(lfmq::message::MessageType::PlayAt, Cursor { frame: 64 })?;
/// assert_eq!(msg.payload_size(), 8);
/// # Ok::<(), lfmq::message::MessageError>(())
/// ```
///
/// # Compile Errors
///
/// ```compile_fail
/// # use lfmq::Payload;
/// #[derive(Payload, Clone, Copy)]
/// struct MissingRepr {  // Error: requires #[repr(C)]
///     x: u32,
/// }
/// ```
///
/// ```compile_fail
/// # use lfmq::Payload;
/// #[derive(Payload, Clone, Copy)]
/// #[repr(C)]
/// struct Padded {  // Error: 3 padding bytes after `flag`
///     flag: u8,
///     value: u32,
/// }
/// ```
///
/// ```compile_fail
/// # use lfmq::Payload;
/// # use lfmq::Message;
/// # use lfmq::message::MessageType;
/// #[derive(Payload, Clone, Copy)]
/// #[repr(C)]
/// struct Pair<T: Payload> {
///     flag: u8,
///     value: T,
/// }
///
/// // Error: `Pair<u32>` has 3 padding bytes after `flag`
/// let _ = Message::new(MessageType::Resize, Pair { flag: 1u8, value: 7u32 });
/// ```
///
/// ```compile_fail
/// # use lfmq::Payload;
/// #[derive(Payload, Clone, Copy)]
/// #[repr(C)]
/// struct TooBig {  // Error: larger than the envelope
///     samples: [f32; 256],
/// }
/// ```
#[proc_macro_derive(Payload)]
pub fn derive_payload(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match derive_payload_impl(input) {
        Ok(tokens) => tokens,
        Err(err) => err.to_compile_error().into(),
    }
}

fn get_crate_path() -> proc_macro2::TokenStream {
    match crate_name("lfmq") {
        Ok(FoundCrate::Itself) => {
            quote!(::lfmq)
        }
        Ok(FoundCrate::Name(name)) => {
            let ident = syn::Ident::new(&name, proc_macro2::Span::call_site());
            quote!(::#ident)
        }
        Err(_) => {
            quote!(::lfmq)
        }
    }
}

fn derive_payload_impl(input: DeriveInput) -> syn::Result<TokenStream> {
    check_repr(&input)?;

    let field_types = get_field_types(&input.data)?;
    field_types.iter().try_for_each(check_types)?;

    let name = &input.ident;
    let generics = &input.generics;
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let crate_path = get_crate_path();

    let mut where_predicates = where_clause
        .map(|w| w.predicates.iter().cloned().collect::<Vec<_>>())
        .unwrap_or_default();

    for ty in &field_types {
        where_predicates.push(syn::parse_quote! {
            #ty: #crate_path::__PayloadPrivate
        });
    }

    let padding_const = no_padding_const(&field_types, &crate_path);

    let trait_impl = if where_predicates.is_empty() {
        quote! {
            unsafe impl #impl_generics #crate_path::__PayloadPrivate for #name #ty_generics #where_clause {
                #padding_const
            }
        }
    } else {
        quote! {
            unsafe impl #impl_generics #crate_path::__PayloadPrivate for #name #ty_generics
            where
                #(#where_predicates),*
            {
                #padding_const
            }
        }
    };

    // Generic payloads get the same checks from `__NO_PADDING` and the size
    // assertion in `Message` once their parameters are known.
    let layout_checks = if generics.params.is_empty() {
        layout_assertions(name, &field_types, &crate_path)
    } else {
        quote! {}
    };

    Ok(quote! {
        #trait_impl
        #layout_checks
    }
    .into())
}

/// Body of `Payload::__NO_PADDING`: the type is exactly as large as its
/// fields, and each field is padding-free itself.
fn no_padding_const(
    field_types: &[Type],
    crate_path: &proc_macro2::TokenStream,
) -> proc_macro2::TokenStream {
    // Fieldless enums and unit structs keep the trait default.
    if field_types.is_empty() {
        return quote! {};
    }

    quote! {
        const __NO_PADDING: bool =
            ::core::mem::size_of::<Self>() == 0 #(+ ::core::mem::size_of::<#field_types>())*
            #(&& <#field_types as #crate_path::__PayloadPrivate>::__NO_PADDING)*;
    }
}

fn layout_assertions(
    name: &Ident,
    field_types: &[Type],
    crate_path: &proc_macro2::TokenStream,
) -> proc_macro2::TokenStream {
    let size_msg = format!("`{name}` does not fit in a message payload");
    let padding_msg = format!("`{name}` has padding bytes and cannot be a message payload");

    // Fieldless enums have no fields to sum, and no padding either.
    let padding_check = if field_types.is_empty() {
        quote! {}
    } else {
        quote! {
            assert!(
                ::core::mem::size_of::<#name>() == 0 #(+ ::core::mem::size_of::<#field_types>())*,
                #padding_msg
            );
        }
    };

    quote! {
        const _: () = {
            assert!(
                ::core::mem::size_of::<#name>() <= #crate_path::__MAX_PAYLOAD_SIZE,
                #size_msg
            );
            #padding_check
        };
    }
}

fn is_int_repr_ident(ident: &syn::Ident) -> bool {
    ident == "u8"
        || ident == "u16"
        || ident == "u32"
        || ident == "u64"
        || ident == "u128"
        || ident == "usize"
        || ident == "i8"
        || ident == "i16"
        || ident == "i32"
        || ident == "i64"
        || ident == "i128"
        || ident == "isize"
}

fn is_valid_repr_ident(ident: &syn::Ident, is_enum: bool) -> bool {
    if is_enum {
        is_int_repr_ident(ident)
    } else {
        ident == "C" || ident == "transparent"
    }
}

fn has_valid_repr(attr: &Attribute, is_enum: bool) -> syn::Result<bool> {
    if !attr.path().is_ident("repr") {
        return Ok(false);
    }

    let mut valid = false;

    attr.parse_nested_meta(|meta| {
        if let Some(ident) = meta.path.get_ident()
            && is_valid_repr_ident(ident, is_enum)
        {
            valid = true;
        }
        // Skip arguments such as `align(8)` so parsing continues.
        if meta.input.peek(syn::token::Paren) {
            let content;
            syn::parenthesized!(content in meta.input);
            content.parse::<proc_macro2::TokenStream>()?;
        }
        Ok(())
    })?;

    Ok(valid)
}

fn check_repr(input: &DeriveInput) -> syn::Result<()> {
    let is_enum = matches!(input.data, Data::Enum(_));
    let has_valid = input.attrs.iter().try_fold(false, |acc, attr| {
        if acc {
            Ok(true)
        } else {
            has_valid_repr(attr, is_enum)
        }
    })?;

    if !has_valid {
        let help_msg = if is_enum {
            "Payload requires an integer repr for enums\n\
             help: add #[repr(u8)] above this item"
        } else {
            "Payload requires #[repr(C)] or #[repr(transparent)]\n\
             help: add #[repr(C)] above this item"
        };
        return Err(Error::new(input.span(), help_msg));
    }
    Ok(())
}

fn get_field_types(data: &Data) -> syn::Result<Vec<Type>> {
    fn extract_field_types(fields: &Fields) -> Vec<Type> {
        match fields {
            Fields::Named(fields) => fields.named.iter().map(|f| f.ty.clone()).collect(),
            Fields::Unnamed(fields) => fields.unnamed.iter().map(|f| f.ty.clone()).collect(),
            Fields::Unit => Vec::new(),
        }
    }

    match data {
        Data::Struct(data_struct) => Ok(extract_field_types(&data_struct.fields)),

        Data::Enum(data_enum) => {
            if let Some(variant) = data_enum
                .variants
                .iter()
                .find(|v| !matches!(v.fields, Fields::Unit))
            {
                return Err(Error::new(
                    variant.span(),
                    "Payload can only be derived for enums without fields\n\
                     help: move the data into a #[repr(C)] struct with an explicit tag field",
                ));
            }
            Ok(Vec::new())
        }

        Data::Union(u) => Err(Error::new(
            u.union_token.span,
            "Payload cannot be derived for unions",
        )),
    }
}

fn check_types(field_ty: &Type) -> syn::Result<()> {
    // Inner recursive walker that has access to the original field type.
    fn walk(ty: &Type, field_ty: &Type) -> syn::Result<()> {
        match ty {
            Type::Path(TypePath { path, .. }) => {
                for segment in &path.segments {
                    check_forbidden_type(&segment.ident, field_ty, segment.ident.span())?;

                    match &segment.arguments {
                        PathArguments::AngleBracketed(args) => {
                            for arg in &args.args {
                                if let GenericArgument::Type(inner_ty) = arg {
                                    walk(inner_ty, field_ty)?;
                                }
                            }
                        }
                        PathArguments::Parenthesized(args) => {
                            for input in &args.inputs {
                                walk(input, field_ty)?;
                            }
                            if let ReturnType::Type(_, ret_ty) = &args.output {
                                walk(ret_ty, field_ty)?;
                            }
                        }
                        PathArguments::None => {}
                    }
                }
            }

            Type::Reference(type_ref) => {
                return Err(Error::new(
                    type_ref.span(),
                    format!(
                        "Field type `{}` contains a reference (`&` or `&mut`).\n\
                         A borrow cannot outlive the bytes copied into the envelope.\n\
                         help: copy the data inline, or pass a raw pointer and keep the target alive",
                        quote!(#field_ty),
                    ),
                ));
            }

            Type::Tuple(tuple) => {
                for elem in &tuple.elems {
                    walk(elem, field_ty)?;
                }
            }

            Type::Array(array) => {
                walk(&array.elem, field_ty)?;
            }

            Type::Ptr(type_ptr) => {
                walk(&type_ptr.elem, field_ty)?;
            }

            Type::Slice(slice) => {
                walk(&slice.elem, field_ty)?;
            }

            Type::Group(group) => {
                walk(&group.elem, field_ty)?;
            }

            Type::Paren(paren) => {
                walk(&paren.elem, field_ty)?;
            }

            // Other variants (Never, Infer, Macro, TraitObject, ImplTrait, Verbatim, etc.)
            // either can't appear as struct fields or don't contain type parameters we care about.
            _ => {}
        }

        Ok(())
    }

    walk(field_ty, field_ty)
}

fn check_forbidden_type(
    ident: &Ident,
    field_ty: &Type,
    span: proc_macro2::Span,
) -> syn::Result<()> {
    enum ForbiddenType {
        Heap,
        RefCounted,
        Lock,
    }

    fn classify_forbidden(ident: &Ident) -> Option<ForbiddenType> {
        const HEAP_TYPES: &[&str] = &["Vec", "Box", "String", "PathBuf", "OsString", "CString"];
        const RC_TYPES: &[&str] = &["Rc", "Arc"];
        const LOCK_TYPES: &[&str] = &["Mutex", "RwLock", "Condvar", "Barrier"];

        if HEAP_TYPES.iter().any(|&name| ident == name) {
            Some(ForbiddenType::Heap)
        } else if RC_TYPES.iter().any(|&name| ident == name) {
            Some(ForbiddenType::RefCounted)
        } else if LOCK_TYPES.iter().any(|&name| ident == name) {
            Some(ForbiddenType::Lock)
        } else {
            None
        }
    }

    if let Some(category) = classify_forbidden(ident) {
        let msg = match category {
            ForbiddenType::Heap => format!(
                "Field type `{}` contains `{}` which owns a heap allocation.\n\
                 Envelope payloads are copied as raw bytes.\n\
                 help: use inline data like `[T; N]` instead of `Vec<T>`, or primitive types",
                quote!(#field_ty),
                ident,
            ),
            ForbiddenType::RefCounted => format!(
                "Field type `{}` contains `{}` which uses reference counting.\n\
                 A byte copy would not update the count.\n\
                 help: keep the shared value on the controller and send an id instead",
                quote!(#field_ty),
                ident,
            ),
            ForbiddenType::Lock => format!(
                "Field type `{}` contains `{}`.\n\
                 The real-time thread must not block on `std::sync::{}`.\n\
                 help: send plain values and let the consumer apply them",
                quote!(#field_ty),
                ident,
                ident,
            ),
        };

        return Err(Error::new(span, msg));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn test_check_repr_accepts_repr_c() {
        let input: DeriveInput = parse_quote! {
            #[repr(C)]
            struct Foo {
                x: u32,
            }
        };
        assert!(check_repr(&input).is_ok());
    }

    #[test]
    fn test_check_repr_accepts_repr_c_with_align() {
        let input: DeriveInput = parse_quote! {
            #[repr(C, align(8))]
            struct Foo {
                x: u64,
            }
        };
        assert!(check_repr(&input).is_ok());
    }

    #[test]
    fn test_check_repr_accepts_repr_transparent() {
        let input: DeriveInput = parse_quote! {
            #[repr(transparent)]
            struct Foo(u32);
        };
        assert!(check_repr(&input).is_ok());
    }

    #[test]
    fn test_check_repr_accepts_repr_u8_enum() {
        let input: DeriveInput = parse_quote! {
            #[repr(u8)]
            enum Foo {
                A,
                B,
            }
        };
        assert!(check_repr(&input).is_ok());
    }

    #[test]
    fn test_check_repr_rejects_repr_c_enum() {
        let input: DeriveInput = parse_quote! {
            #[repr(C)]
            enum Foo {
                A,
            }
        };
        assert!(check_repr(&input).is_err());
    }

    #[test]
    fn test_check_repr_rejects_int_repr_struct() {
        let input: DeriveInput = parse_quote! {
            #[repr(u8)]
            struct Foo {
                x: u8,
            }
        };
        assert!(check_repr(&input).is_err());
    }

    #[test]
    fn test_check_repr_rejects_no_repr() {
        let input: DeriveInput = parse_quote! {
            struct Foo {
                x: u32,
            }
        };
        assert!(check_repr(&input).is_err());
    }

    #[test]
    fn test_check_types_accepts_primitives() {
        let ty: Type = parse_quote!(u32);
        assert!(check_types(&ty).is_ok());
    }

    #[test]
    fn test_check_types_accepts_raw_pointer() {
        let ty: Type = parse_quote!(*const u32);
        assert!(check_types(&ty).is_ok());
    }

    #[test]
    fn test_check_types_accepts_option_non_null() {
        let ty: Type = parse_quote!(Option<NonNull<f32>>);
        assert!(check_types(&ty).is_ok());
    }

    #[test]
    fn test_check_types_rejects_pointer_to_vec() {
        let ty: Type = parse_quote!(*mut Vec<u8>);
        assert!(check_types(&ty).is_err());
    }

    #[test]
    fn test_check_types_rejects_vec() {
        let ty: Type = parse_quote!(Vec<u8>);
        assert!(check_types(&ty).is_err());
    }

    #[test]
    fn test_check_types_rejects_box() {
        let ty: Type = parse_quote!(Box<u32>);
        assert!(check_types(&ty).is_err());
    }

    #[test]
    fn test_check_types_rejects_string() {
        let ty: Type = parse_quote!(String);
        assert!(check_types(&ty).is_err());
    }

    #[test]
    fn test_check_types_rejects_arc() {
        let ty: Type = parse_quote!(Arc<u32>);
        assert!(check_types(&ty).is_err());
    }

    #[test]
    fn test_check_types_rejects_reference() {
        let ty: Type = parse_quote!(&u32);
        assert!(check_types(&ty).is_err());
    }

    #[test]
    fn test_check_types_rejects_static_str() {
        let ty: Type = parse_quote!(&'static str);
        assert!(check_types(&ty).is_err());
    }

    #[test]
    fn test_check_types_rejects_mutex() {
        let ty: Type = parse_quote!(Mutex<u32>);
        assert!(check_types(&ty).is_err());
    }

    #[test]
    fn test_check_types_rejects_array_of_rwlock() {
        let ty: Type = parse_quote!([RwLock<u64>; 4]);
        assert!(check_types(&ty).is_err());
    }

    #[test]
    fn test_check_types_rejects_option_box() {
        let ty: Type = parse_quote!(Option<Box<u8>>);
        assert!(check_types(&ty).is_err());
    }

    #[test]
    fn test_get_field_types_struct() {
        let input: DeriveInput = parse_quote! {
            struct Foo {
                x: u32,
                y: u64,
            }
        };
        let types = get_field_types(&input.data).unwrap();
        assert_eq!(types.len(), 2);
    }

    #[test]
    fn test_get_field_types_tuple_struct() {
        let input: DeriveInput = parse_quote! {
            struct Foo(u32, u64);
        };
        let types = get_field_types(&input.data).unwrap();
        assert_eq!(types.len(), 2);
    }

    #[test]
    fn test_get_field_types_fieldless_enum() {
        let input: DeriveInput = parse_quote! {
            enum Foo {
                A,
                B,
            }
        };
        let types = get_field_types(&input.data).unwrap();
        assert!(types.is_empty());
    }

    #[test]
    fn test_get_field_types_rejects_data_enum() {
        let input: DeriveInput = parse_quote! {
            enum Foo {
                A(u32),
                B,
            }
        };
        assert!(get_field_types(&input.data).is_err());
    }

    #[test]
    fn test_get_field_types_rejects_union() {
        let input: DeriveInput = parse_quote! {
            union Foo {
                x: u32,
                y: f32,
            }
        };
        assert!(get_field_types(&input.data).is_err());
    }

    #[test]
    fn test_layout_assertions_sum_field_sizes() {
        let name: Ident = parse_quote!(Foo);
        let fields: Vec<Type> = vec![parse_quote!(u32), parse_quote!(f32)];
        let tokens = layout_assertions(&name, &fields, &quote!(::lfmq)).to_string();

        assert!(tokens.contains("__MAX_PAYLOAD_SIZE"));
        assert!(tokens.contains("size_of :: < u32 >"));
        assert!(tokens.contains("size_of :: < f32 >"));
    }

    #[test]
    fn test_layout_assertions_skip_padding_for_fieldless() {
        let name: Ident = parse_quote!(Foo);
        let tokens = layout_assertions(&name, &[], &quote!(::lfmq)).to_string();

        assert!(tokens.contains("__MAX_PAYLOAD_SIZE"));
        assert!(!tokens.contains("padding"));
    }

    #[test]
    fn test_no_padding_const_covers_every_field() {
        let fields: Vec<Type> = vec![parse_quote!(u8), parse_quote!(T)];
        let tokens = no_padding_const(&fields, &quote!(::lfmq)).to_string();

        assert!(tokens.contains("__NO_PADDING"));
        assert!(tokens.contains("size_of :: < Self >"));
        assert!(tokens.contains("size_of :: < T >"));
        assert!(tokens.contains("< T as :: lfmq :: __PayloadPrivate > :: __NO_PADDING"));
    }

    #[test]
    fn test_no_padding_const_defaults_for_fieldless() {
        assert!(no_padding_const(&[], &quote!(::lfmq)).is_empty());
    }

    #[test]
    fn test_has_valid_repr_skips_align_argument() {
        let input: DeriveInput = parse_quote! {
            #[repr(align(16), C)]
            struct Foo {
                x: u128,
            }
        };
        assert!(has_valid_repr(&input.attrs[0], false).unwrap());
    }
}
