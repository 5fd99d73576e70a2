/*
 * Integration tests for edge-doctor.
 *
 * This suite validates the behavior that crosses module boundaries:
 * - Key provisioning on a real (temporary) filesystem, including the
 *   permission bits and idempotence guarantees.
 * - Remote trust-store installation through a scripted command channel.
 * - Orchestrated runs against unreachable targets, which must degrade to
 *   a single failed connection result rather than an error.
 *
 * Nothing here talks to a real SSH server: session-level behavior is
 * covered by unit tests against scripted channels, and the bootstrap
 * state machine is exercised up to the point where a transport would be
 * opened.
 */

mod common;
mod integration;
