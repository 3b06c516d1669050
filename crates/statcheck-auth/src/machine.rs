//! Status derivation for the session status machine.
//!
//! The status is a pure function of the current state and the three inputs
//! (onboarding marker, backend loading, backend validation), evaluated as an
//! ordered guard chain where the first match wins. Keeping it pure makes
//! recomputation idempotent: the session manager can re-run it on every
//! upstream change without side effects.

use crate::types::{AuthStatus, BackendSignal};

/// Inputs to a status recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusInputs {
    /// Whether the one-time onboarding marker has been persisted.
    pub onboarding_complete: bool,
    /// Latest backend validation signal.
    pub backend: BackendSignal,
}

/// Derive the next status from the current one and the latest inputs.
///
/// Guard order:
/// 1. Onboarding incomplete wins over everything.
/// 2. Guest is sticky; only explicit sign-in/out paths leave it.
/// 3. While backend validation is in flight, hold the current state.
/// 4. Validated credential means authenticated.
/// 5. Otherwise unauthenticated.
pub fn next_status(current: AuthStatus, inputs: &StatusInputs) -> AuthStatus {
    if !inputs.onboarding_complete {
        return AuthStatus::Onboarding;
    }
    if current == AuthStatus::Guest {
        return AuthStatus::Guest;
    }
    if inputs.backend.is_loading {
        // Holding Onboarding after the marker is set would re-show the
        // first-run flow; fall back to Loading until the backend settles.
        return if current == AuthStatus::Onboarding {
            AuthStatus::Loading
        } else {
            current
        };
    }
    if inputs.backend.validated {
        return AuthStatus::Authenticated;
    }
    AuthStatus::Unauthenticated
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATUSES: [AuthStatus; 5] = [
        AuthStatus::Loading,
        AuthStatus::Onboarding,
        AuthStatus::Unauthenticated,
        AuthStatus::Authenticated,
        AuthStatus::Guest,
    ];

    fn inputs(onboarding_complete: bool, validated: bool, is_loading: bool) -> StatusInputs {
        StatusInputs {
            onboarding_complete,
            backend: BackendSignal {
                validated,
                is_loading,
            },
        }
    }

    #[test]
    fn onboarding_incomplete_wins_from_every_state() {
        for current in ALL_STATUSES {
            assert_eq!(
                next_status(current, &inputs(false, true, false)),
                AuthStatus::Onboarding
            );
        }
    }

    #[test]
    fn guest_is_sticky_against_all_automatic_inputs() {
        for validated in [false, true] {
            for is_loading in [false, true] {
                assert_eq!(
                    next_status(AuthStatus::Guest, &inputs(true, validated, is_loading)),
                    AuthStatus::Guest
                );
            }
        }
    }

    #[test]
    fn loading_backend_holds_the_current_state() {
        for current in [
            AuthStatus::Loading,
            AuthStatus::Unauthenticated,
            AuthStatus::Authenticated,
        ] {
            assert_eq!(next_status(current, &inputs(true, false, true)), current);
            assert_eq!(next_status(current, &inputs(true, true, true)), current);
        }
    }

    #[test]
    fn onboarding_exits_to_loading_while_backend_is_in_flight() {
        assert_eq!(
            next_status(AuthStatus::Onboarding, &inputs(true, false, true)),
            AuthStatus::Loading
        );
    }

    #[test]
    fn validated_settles_to_authenticated() {
        assert_eq!(
            next_status(AuthStatus::Loading, &inputs(true, true, false)),
            AuthStatus::Authenticated
        );
        assert_eq!(
            next_status(AuthStatus::Unauthenticated, &inputs(true, true, false)),
            AuthStatus::Authenticated
        );
    }

    #[test]
    fn unvalidated_settles_to_unauthenticated() {
        assert_eq!(
            next_status(AuthStatus::Loading, &inputs(true, false, false)),
            AuthStatus::Unauthenticated
        );
        assert_eq!(
            next_status(AuthStatus::Authenticated, &inputs(true, false, false)),
            AuthStatus::Unauthenticated
        );
    }

    #[test]
    fn authenticated_never_returns_to_onboarding_once_complete() {
        // The onboarding marker is one-directional: once persisted it never
        // reads false again, so with it set no input combination can send an
        // authenticated session back to onboarding.
        for validated in [false, true] {
            for is_loading in [false, true] {
                let next = next_status(
                    AuthStatus::Authenticated,
                    &inputs(true, validated, is_loading),
                );
                assert_ne!(next, AuthStatus::Onboarding);
            }
        }
    }

    #[test]
    fn recomputation_is_idempotent() {
        for current in ALL_STATUSES {
            for onboarding in [false, true] {
                for validated in [false, true] {
                    for is_loading in [false, true] {
                        let i = inputs(onboarding, validated, is_loading);
                        let once = next_status(current, &i);
                        let twice = next_status(once, &i);
                        assert_eq!(once, twice);
                    }
                }
            }
        }
    }
}
