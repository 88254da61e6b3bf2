/*! Cross-module tests for the core data model.
 *
 * Layout invariants only show up when the slot manager, struct templates and storage
 * variables are exercised together, so those checks live here rather than in one module.
 */

mod ir_dump_tests;
mod layout_tests;
