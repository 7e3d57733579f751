/// Router Module Index
///
/// Splits the routing table by access level. Protection is not applied as a router layer:
/// every protected handler takes an `Authorized<P>` extractor naming its own permission,
/// so a route cannot be registered without stating what it requires.

/// Routes reachable without a token: health, registration and login.
pub mod public;

/// Routes whose handlers demand a bearer token carrying a specific permission.
pub mod authenticated;
