//! Instruction pointer over a program
//!
//! Procedures run in `execution_order`; empty procedures are skipped. The
//! `instruction_pointer` counts steps across the whole program while `step_index` is
//! local to the procedure. `order_index` is the slot in the run order, so a procedure
//! listed twice runs twice.

use serde::{Deserialize, Serialize};

use crate::program::{Program, Step};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cursor {
    pub procedure_id: String,
    pub step_id: String,
    pub step_index: usize,
    pub instruction_pointer: usize,
    #[serde(default)]
    pub order_index: usize,
}

/// Cursor on the first step of the first non-empty procedure
pub fn first_cursor(program: &Program) -> Option<Cursor> {
    first_step_from(program, 0, 0)
}

/// Cursor after `cursor`, or `None` when the program is exhausted
pub fn next_cursor(program: &Program, cursor: &Cursor) -> Option<Cursor> {
    let order = program.ordered_procedures();
    let procedure = *order
        .get(cursor.order_index)
        .filter(|p| p.id == cursor.procedure_id)?;
    let next_index = cursor.step_index + 1;
    let instruction_pointer = cursor.instruction_pointer + 1;

    if let Some(step) = procedure.steps.get(next_index) {
        return Some(Cursor {
            procedure_id: procedure.id.clone(),
            step_id: step.id.clone(),
            step_index: next_index,
            instruction_pointer,
            order_index: cursor.order_index,
        });
    }

    first_step_from(program, cursor.order_index + 1, instruction_pointer)
}

/// Step the cursor points at
pub fn step_at<'a>(program: &'a Program, cursor: &Cursor) -> Option<&'a Step> {
    program
        .procedure(&cursor.procedure_id)?
        .steps
        .get(cursor.step_index)
        .filter(|step| step.id == cursor.step_id)
}

fn first_step_from(
    program: &Program,
    procedure_position: usize,
    instruction_pointer: usize,
) -> Option<Cursor> {
    program
        .ordered_procedures()
        .into_iter()
        .enumerate()
        .skip(procedure_position)
        .find_map(|(order_index, procedure)| {
            procedure.steps.first().map(|step| Cursor {
                procedure_id: procedure.id.clone(),
                step_id: step.id.clone(),
                step_index: 0,
                instruction_pointer,
                order_index,
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn program() -> Program {
        Program::from_value(json!({
            "name": "cursor",
            "execution_order": ["b", "empty", "a"],
            "procedures": [
                {"id": "a", "steps": [{"id": "a1", "type": "note", "message": "x"}]},
                {"id": "empty", "steps": []},
                {"id": "b", "steps": [
                    {"id": "b1", "type": "note", "message": "x"},
                    {"id": "b2", "type": "note", "message": "x"}
                ]}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_walks_execution_order_and_skips_empty_procedures() {
        let program = program();
        let mut cursor = first_cursor(&program);
        let mut visited = Vec::new();

        while let Some(c) = cursor {
            assert!(step_at(&program, &c).is_some());
            visited.push((c.step_id.clone(), c.step_index, c.instruction_pointer));
            cursor = next_cursor(&program, &c);
        }

        assert_eq!(
            visited,
            vec![
                ("b1".to_string(), 0, 0),
                ("b2".to_string(), 1, 1),
                ("a1".to_string(), 0, 2),
            ]
        );
    }

    #[test]
    fn test_stale_cursor_does_not_resolve() {
        let program = program();
        let stale = Cursor {
            procedure_id: "b".to_string(),
            step_id: "a1".to_string(),
            step_index: 0,
            instruction_pointer: 0,
            order_index: 0,
        };
        assert!(step_at(&program, &stale).is_none());
    }

    #[test]
    fn test_repeated_procedure_runs_once_per_listing() {
        let program = Program::from_value(json!({
            "name": "twice",
            "execution_order": ["a", "a"],
            "procedures": [
                {"id": "a", "steps": [
                    {"id": "a1", "type": "note", "message": "x"},
                    {"id": "a2", "type": "note", "message": "x"}
                ]}
            ]
        }))
        .unwrap();

        let mut cursor = first_cursor(&program);
        let mut visited = Vec::new();
        while let Some(c) = cursor {
            visited.push((c.step_id.clone(), c.order_index, c.instruction_pointer));
            cursor = next_cursor(&program, &c);
        }

        assert_eq!(
            visited,
            vec![
                ("a1".to_string(), 0, 0),
                ("a2".to_string(), 0, 1),
                ("a1".to_string(), 1, 2),
                ("a2".to_string(), 1, 3),
            ]
        );
    }
}
