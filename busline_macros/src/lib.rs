mod event;

use proc_macro::TokenStream;

// ============================================================================
// #[derive(IntegrationEvent)] derive macro
// ============================================================================

/// Derive macro for the `IntegrationEvent` trait.
///
/// # Usage
///
/// ```ignore
/// #[derive(Serialize, Deserialize, IntegrationEvent)]
/// struct OrderPlaced {
///     pub id: String,
/// }
///
/// #[derive(Serialize, Deserialize, IntegrationEvent)]
/// #[event(name = "order.shipped")]
/// struct OrderShipped {
///     pub id: String,
/// }
/// ```
///
/// - The event name defaults to the type's identifier (`OrderPlaced`).
/// - `#[event(name = "...")]` overrides it. The name is the message label
///   and the broker filter rule name, so it must be unique per bus.
#[proc_macro_derive(IntegrationEvent, attributes(event))]
pub fn derive_integration_event(input: TokenStream) -> TokenStream {
    event::derive_integration_event(input)
}
