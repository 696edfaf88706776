//! Mobile-money checkout state machine.
//!
//! ```text
//! Idle ──begin──▶ AwaitingInput ──submit──▶ Submitting ──▶ Success ──refresh──▶ Idle
//!   ▲                 │  ▲                        │
//!   └────dismiss──────┘  └───────retry───── Failed ◀┘
//! ```
//!
//! Every transition is a check-and-set on a `watch` channel made before any
//! await, so a second `submit` racing the first sees `Submitting` and does
//! nothing.

use std::sync::{Arc, Mutex, PoisonError};

use agroshop_core::pricing::CartTotals;
use agroshop_core::{CartId, CheckoutOutcome, CheckoutRequest, PhoneError, PhoneNumber};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use crate::api::{ApiClient, paths};
use crate::cart::CartStore;
use crate::config::CheckoutConfig;
use crate::error::{ApiError, add_breadcrumb, capture};

/// Where the checkout dialog is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutState {
    /// No checkout in progress.
    Idle,
    /// Waiting for the phone number.
    AwaitingInput {
        /// Validation message for the last rejected phone input.
        phone_error: Option<String>,
    },
    /// The initiation call is in flight.
    Submitting,
    /// The provider accepted the request; the cart refresh is pending.
    Success {
        /// Provider-issued request ID.
        checkout_request_id: String,
    },
    /// The initiation call failed.
    Failed {
        /// User-visible reason.
        message: String,
    },
}

impl CheckoutState {
    /// Short state name for logs and errors.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingInput { .. } => "awaiting_input",
            Self::Submitting => "submitting",
            Self::Success { .. } => "success",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Result of a submit that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The provider accepted the request.
    Initiated {
        /// Provider-issued request ID.
        checkout_request_id: String,
    },
    /// A submission was already in flight; nothing was sent.
    AlreadySubmitting,
}

/// Checkout command failure.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Nothing is selected, or there is no cart.
    #[error("Select at least one item to check out")]
    EmptySelection,

    /// The phone number failed client-side validation.
    #[error("Invalid phone number: {0}")]
    InvalidPhone(#[from] PhoneError),

    /// The command does not apply in the current state.
    #[error("Cannot {action} while checkout is {state}")]
    InvalidState {
        /// Attempted command.
        action: &'static str,
        /// State name at the time.
        state: &'static str,
    },

    /// The initiation call failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl CheckoutError {
    /// Message to show the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidPhone(err) => format!("{err} (format: 254XXXXXXXXX)"),
            Self::Api(err) => err.user_message(),
            other => other.to_string(),
        }
    }
}

#[derive(Serialize)]
struct InitiateRequest<'a> {
    cart_id: CartId,
    phone: &'a str,
}

#[derive(Deserialize)]
struct InitiateResponse {
    checkout: InitiatedCheckout,
}

#[derive(Deserialize)]
struct InitiatedCheckout {
    #[serde(alias = "CheckoutRequestID")]
    checkout_request_id: String,
}

/// Drives one checkout at a time against a [`CartStore`].
#[derive(Clone)]
pub struct CheckoutInitiator {
    inner: Arc<CheckoutInner>,
}

struct CheckoutInner {
    api: ApiClient,
    cart: CartStore,
    config: CheckoutConfig,
    state: watch::Sender<CheckoutState>,
    last_request: Mutex<Option<CheckoutRequest>>,
}

impl CheckoutInitiator {
    /// Create an idle initiator.
    #[must_use]
    pub fn new(api: ApiClient, cart: CartStore, config: CheckoutConfig) -> Self {
        Self {
            inner: Arc::new(CheckoutInner {
                api,
                cart,
                config,
                state: watch::Sender::new(CheckoutState::Idle),
                last_request: Mutex::new(None),
            }),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> CheckoutState {
        self.inner.state.borrow().clone()
    }

    /// Watch the state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CheckoutState> {
        self.inner.state.subscribe()
    }

    /// Totals for the current selection, for the order summary.
    #[must_use]
    pub fn summary(&self) -> CartTotals {
        self.inner.cart.totals()
    }

    /// The most recent initiation attempt, with its outcome.
    #[must_use]
    pub fn last_request(&self) -> Option<CheckoutRequest> {
        self.inner
            .last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Open the phone-number prompt.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptySelection` if no cart line is selected,
    /// before any state change, or `CheckoutError::InvalidState` unless the
    /// checkout is idle.
    pub fn begin(&self) -> Result<(), CheckoutError> {
        let snapshot = self.inner.cart.snapshot();
        if snapshot.cart_id().is_none() || snapshot.totals.selected_count == 0 {
            warn!("checkout rejected: nothing selected");
            return Err(CheckoutError::EmptySelection);
        }

        self.transition("begin", |state| match state {
            CheckoutState::Idle | CheckoutState::AwaitingInput { .. } => {
                Some(CheckoutState::AwaitingInput { phone_error: None })
            }
            _ => None,
        })
    }

    /// Validate the phone number and initiate payment.
    ///
    /// While a submission is in flight this is a no-op returning
    /// [`SubmitOutcome::AlreadySubmitting`].
    ///
    /// # Errors
    ///
    /// - `CheckoutError::InvalidState` unless awaiting input
    /// - `CheckoutError::InvalidPhone` if validation fails; the state stays
    ///   `AwaitingInput` with the field error and nothing is sent
    /// - `CheckoutError::EmptySelection` if the selection emptied meanwhile
    /// - `CheckoutError::Api` if initiation fails; the state becomes `Failed`
    #[instrument(skip_all)]
    pub async fn submit(&self, phone: &str) -> Result<SubmitOutcome, CheckoutError> {
        match &*self.inner.state.borrow() {
            CheckoutState::Submitting => {
                debug!("checkout already submitting, ignoring submit");
                return Ok(SubmitOutcome::AlreadySubmitting);
            }
            CheckoutState::AwaitingInput { .. } => {}
            other => {
                return Err(CheckoutError::InvalidState {
                    action: "submit",
                    state: other.name(),
                });
            }
        }

        let phone = match PhoneNumber::parse(phone) {
            Ok(phone) => phone,
            Err(err) => {
                warn!(error = %err, "checkout phone rejected");
                let message = err.to_string();
                self.inner.state.send_if_modified(|state| {
                    if matches!(state, CheckoutState::AwaitingInput { .. }) {
                        *state = CheckoutState::AwaitingInput {
                            phone_error: Some(message),
                        };
                        true
                    } else {
                        false
                    }
                });
                return Err(CheckoutError::InvalidPhone(err));
            }
        };

        let snapshot = self.inner.cart.snapshot();
        let Some(cart_id) = snapshot.cart_id().filter(|_| snapshot.totals.selected_count > 0)
        else {
            warn!("checkout rejected: selection emptied before submit");
            return Err(CheckoutError::EmptySelection);
        };

        // Single entry: only one caller moves AwaitingInput to Submitting.
        let mut previous = None;
        let entered = self.inner.state.send_if_modified(|state| {
            if matches!(state, CheckoutState::AwaitingInput { .. }) {
                *state = CheckoutState::Submitting;
                true
            } else {
                previous = Some(state.name());
                false
            }
        });
        if !entered {
            return match previous {
                Some("submitting") => Ok(SubmitOutcome::AlreadySubmitting),
                other => Err(CheckoutError::InvalidState {
                    action: "submit",
                    state: other.unwrap_or("unknown"),
                }),
            };
        }

        let cart_label = cart_id.to_string();
        let masked = phone.masked();
        add_breadcrumb(
            "checkout",
            "Initiating payment",
            Some(&[("cart_id", cart_label.as_str()), ("phone", masked.as_str())]),
        );
        self.record(CheckoutRequest {
            cart_id,
            phone: phone.clone(),
            checkout_request_id: None,
            outcome: CheckoutOutcome::Pending,
        });

        let body = InitiateRequest {
            cart_id,
            phone: phone.as_str(),
        };
        let result = self
            .inner
            .api
            .post::<_, InitiateResponse>(paths::CHECKOUT_INITIATE, &body)
            .await;

        match result {
            Ok(response) => {
                let checkout_request_id = response.checkout.checkout_request_id;
                debug!(%checkout_request_id, "payment initiated");
                self.record(CheckoutRequest {
                    cart_id,
                    phone,
                    checkout_request_id: Some(checkout_request_id.clone()),
                    outcome: CheckoutOutcome::Initiated,
                });
                self.inner.state.send_replace(CheckoutState::Success {
                    checkout_request_id: checkout_request_id.clone(),
                });
                self.schedule_refresh(checkout_request_id.clone());
                Ok(SubmitOutcome::Initiated {
                    checkout_request_id,
                })
            }
            Err(err) => {
                capture(&err);
                let message = err.user_message();
                self.record(CheckoutRequest {
                    cart_id,
                    phone,
                    checkout_request_id: None,
                    outcome: CheckoutOutcome::Failed(message.clone()),
                });
                self.inner
                    .state
                    .send_replace(CheckoutState::Failed { message });
                Err(CheckoutError::Api(err))
            }
        }
    }

    /// Return from `Failed` to the phone prompt. Nothing is resubmitted.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::InvalidState` unless the checkout failed.
    pub fn retry(&self) -> Result<(), CheckoutError> {
        self.transition("retry", |state| match state {
            CheckoutState::Failed { .. } => Some(CheckoutState::AwaitingInput { phone_error: None }),
            _ => None,
        })
    }

    /// Close the prompt without paying.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::InvalidState` while submitting or after
    /// success.
    pub fn dismiss(&self) -> Result<(), CheckoutError> {
        self.transition("dismiss", |state| match state {
            CheckoutState::Idle
            | CheckoutState::AwaitingInput { .. }
            | CheckoutState::Failed { .. } => Some(CheckoutState::Idle),
            _ => None,
        })
    }

    // =========================================================================
    // Helper Functions
    // =========================================================================

    fn transition<F>(&self, action: &'static str, next: F) -> Result<(), CheckoutError>
    where
        F: FnOnce(&CheckoutState) -> Option<CheckoutState>,
    {
        let mut rejected = None;
        self.inner.state.send_if_modified(|state| {
            if let Some(next) = next(state) {
                let changed = *state != next;
                *state = next;
                changed
            } else {
                rejected = Some(state.name());
                false
            }
        });
        match rejected {
            None => Ok(()),
            Some(state) => Err(CheckoutError::InvalidState { action, state }),
        }
    }

    fn record(&self, request: CheckoutRequest) {
        *self
            .inner
            .last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(request);
    }

    /// After the configured delay, reset the selection, refetch the cart and
    /// return to `Idle`.
    fn schedule_refresh(&self, checkout_request_id: String) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(inner.config.refresh_delay).await;

            inner.cart.reset_selection();
            if let Err(err) = inner.cart.fetch().await {
                warn!(error = %err, "cart refresh after checkout failed");
            }

            inner.state.send_if_modified(|state| {
                let finished = matches!(
                    state,
                    CheckoutState::Success { checkout_request_id: current }
                        if *current == checkout_request_id
                );
                if finished {
                    *state = CheckoutState::Idle;
                }
                finished
            });
            debug!(%checkout_request_id, "post-checkout refresh complete");
        });
    }
}

impl std::fmt::Debug for CheckoutInitiator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutInitiator")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
