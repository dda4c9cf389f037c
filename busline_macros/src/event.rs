use proc_macro::TokenStream;
use quote::quote;
use syn::{DeriveInput, LitStr};

pub fn derive_integration_event(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    let event_name = match extract_event_name(&input) {
        Ok(event_name) => event_name,
        Err(err) => return err.to_compile_error().into(),
    };

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let expanded: proc_macro2::TokenStream = quote! {
        impl #impl_generics ::busline::IntegrationEvent for #name #ty_generics #where_clause {
            const NAME: &'static str = #event_name;
        }
    };

    TokenStream::from(expanded)
}

fn extract_event_name(input: &DeriveInput) -> syn::Result<String> {
    for attr in &input.attrs {
        if !attr.path().is_ident("event") {
            continue;
        }

        let mut event_name = None;
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let value: LitStr = meta.value()?.parse()?;
                event_name = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("unsupported event attribute, expected `name = \"...\"`"))
            }
        })?;

        if let Some(name) = event_name {
            if name.trim().is_empty() {
                return Err(syn::Error::new_spanned(attr, "event name must not be empty"));
            }
            return Ok(name);
        }
    }

    // Default: the type's own identifier
    Ok(input.ident.to_string())
}
