//! Procedural macros for producer

use darling::{FromDeriveInput, FromField, FromVariant};
use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{parse_macro_input, DeriveInput};

/// Container-level attributes for #[derive(Action)]
#[derive(Debug, FromDeriveInput)]
#[darling(attributes(action), supports(enum_any))]
struct ActionOpts {
    ident: syn::Ident,
    data: darling::ast::Data<ActionVariant, ()>,

    /// State type the dispatcher methods return, e.g. `state = "AppState"`
    #[darling(default)]
    state: Option<String>,

    /// Generate the `{Name}Dispatchers` trait
    #[darling(default)]
    dispatchers: bool,
}

/// Variant-level data
#[derive(Debug, FromVariant)]
#[darling(attributes(action))]
struct ActionVariant {
    ident: syn::Ident,
    fields: darling::ast::Fields<ActionField>,
}

#[derive(Debug, FromField)]
struct ActionField {
    ident: Option<syn::Ident>,
    ty: syn::Type,
}

/// Convert PascalCase to snake_case
fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, ch) in s.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.push(ch.to_lowercase().next().unwrap());
        } else {
            result.push(ch);
        }
    }
    result
}

/// Derive macro for the Action trait
///
/// Generates a `name()` method that returns the variant name as a static
/// string.
///
/// With `#[action(state = "MyState", dispatchers)]`, also generates a
/// `{Name}Dispatchers` trait with one method per variant (variant name in
/// snake_case, variant fields as arguments), implemented for both
/// `Producer<MyState, {Name}>` and `Dispatchers<MyState, {Name}>`.
///
/// # Example
/// ```ignore
/// #[derive(Action, Clone, Debug)]
/// #[action(state = "CounterState", dispatchers)]
/// enum CounterAction {
///     Increment { by: i32 },
///     Reset,
/// }
///
/// let action = CounterAction::Reset;
/// assert_eq!(action.name(), "Reset");
///
/// // Generated methods, each committing the action and returning the
/// // new state:
/// producer.increment(5);
/// producer.reset();
/// ```
#[proc_macro_derive(Action, attributes(action))]
pub fn derive_action(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    // Try to parse with darling for attributes
    let opts = match ActionOpts::from_derive_input(&input) {
        Ok(opts) => opts,
        Err(e) => return e.write_errors().into(),
    };

    let name = &opts.ident;

    let variants = match &opts.data {
        darling::ast::Data::Enum(variants) => variants,
        _ => {
            return syn::Error::new_spanned(&input, "Action can only be derived for enums")
                .to_compile_error()
                .into();
        }
    };

    // Generate basic name() implementation
    let name_arms = variants.iter().map(|v| {
        let variant_name = &v.ident;
        let variant_str = variant_name.to_string();

        match &v.fields.style {
            darling::ast::Style::Unit => quote! {
                #name::#variant_name => #variant_str
            },
            darling::ast::Style::Tuple => quote! {
                #name::#variant_name(..) => #variant_str
            },
            darling::ast::Style::Struct => quote! {
                #name::#variant_name { .. } => #variant_str
            },
        }
    });

    let mut expanded = quote! {
        impl producer::Action for #name {
            fn name(&self) -> &'static str {
                match self {
                    #(#name_arms),*
                }
            }
        }
    };

    // Generate the dispatcher trait if requested
    if opts.dispatchers {
        let state = match &opts.state {
            Some(state) => match syn::parse_str::<syn::Type>(state) {
                Ok(ty) => ty,
                Err(e) => {
                    return syn::Error::new_spanned(
                        &input,
                        format!("invalid state type in #[action(state = ...)]: {e}"),
                    )
                    .to_compile_error()
                    .into();
                }
            },
            None => {
                return syn::Error::new_spanned(
                    &input,
                    "#[action(dispatchers)] requires #[action(state = \"...\")]",
                )
                .to_compile_error()
                .into();
            }
        };

        let trait_name = format_ident!("{}Dispatchers", name);

        let methods: Vec<_> = variants
            .iter()
            .map(|v| {
                let variant_name = &v.ident;
                let method_name = format_ident!("{}", to_snake_case(&variant_name.to_string()));
                let doc = format!("Dispatch [`{}::{}`].", name, variant_name);

                match &v.fields.style {
                    darling::ast::Style::Unit => quote! {
                        #[doc = #doc]
                        fn #method_name(&self) -> #state {
                            self.dispatch_action(#name::#variant_name)
                        }
                    },
                    darling::ast::Style::Tuple => {
                        let args: Vec<_> = v
                            .fields
                            .iter()
                            .enumerate()
                            .map(|(i, field)| {
                                let arg = format_ident!("arg{}", i);
                                let ty = &field.ty;
                                quote! { #arg: #ty }
                            })
                            .collect();
                        let names: Vec<_> = (0..v.fields.len())
                            .map(|i| format_ident!("arg{}", i))
                            .collect();
                        quote! {
                            #[doc = #doc]
                            fn #method_name(&self, #(#args),*) -> #state {
                                self.dispatch_action(#name::#variant_name(#(#names),*))
                            }
                        }
                    }
                    darling::ast::Style::Struct => {
                        let args: Vec<_> = v
                            .fields
                            .iter()
                            .map(|field| {
                                let ident = &field.ident;
                                let ty = &field.ty;
                                quote! { #ident: #ty }
                            })
                            .collect();
                        let names: Vec<_> =
                            v.fields.iter().map(|field| &field.ident).collect();
                        quote! {
                            #[doc = #doc]
                            fn #method_name(&self, #(#args),*) -> #state {
                                self.dispatch_action(#name::#variant_name { #(#names),* })
                            }
                        }
                    }
                }
            })
            .collect();

        let trait_doc = format!(
            "Dispatcher methods for [`{}`].\n\n\
             Each method builds the corresponding action, dispatches it, and\n\
             returns the new state. Implemented for the producer itself and\n\
             for its dispatch-only handle.",
            name
        );

        expanded = quote! {
            #expanded

            #[doc = #trait_doc]
            pub trait #trait_name {
                /// Commit an action and return the new state.
                fn dispatch_action(&self, action: #name) -> #state;

                #(#methods)*
            }

            impl #trait_name for producer::Producer<#state, #name> {
                fn dispatch_action(&self, action: #name) -> #state {
                    self.dispatch(action)
                }
            }

            impl #trait_name for producer::Dispatchers<#state, #name> {
                fn dispatch_action(&self, action: #name) -> #state {
                    self.dispatch(action)
                }
            }
        };
    }

    TokenStream::from(expanded)
}
