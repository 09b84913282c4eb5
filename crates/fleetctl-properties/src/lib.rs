//! Holds no runtime code of its own. Exists to exercise, via
//! `proptest`, the cross-cutting laws spec.md 8 states should hold for
//! the workspace: reconcile idempotence, object round-tripping, and
//! delete-priority totality. See `tests/`.
