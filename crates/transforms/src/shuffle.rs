use crate::Session;
use murk_core::ast::Statement;
use rand::seq::SliceRandom;
use tracing::debug;

/// Reorders statements textually while keeping their execution order.
///
/// Every statement is wrapped into a segment `~Lk: stmt_k; Перейти ~Lk+1;` and
/// the segments are shuffled between an entry jump to `~L0` and the final
/// label `~Ln`.
pub fn shuffle(session: &mut Session, statements: Vec<Statement>) -> Vec<Statement> {
    if statements.is_empty() {
        return statements;
    }

    let labels: Vec<String> = (0..=statements.len())
        .map(|_| session.fresh_name_between(5, 10))
        .collect();

    let mut segments: Vec<[Statement; 3]> = statements
        .into_iter()
        .enumerate()
        .map(|(index, statement)| {
            [
                Statement::Label(labels[index].clone()),
                statement,
                Statement::Goto(labels[index + 1].clone()),
            ]
        })
        .collect();
    segments.shuffle(session.rng());
    debug!(segments = segments.len(), "shuffled statement segments");

    let mut out = Vec::with_capacity(segments.len() * 3 + 2);
    out.push(Statement::Goto(labels[0].clone()));
    out.extend(segments.into_iter().flatten());
    out.push(Statement::Label(labels[labels.len() - 1].clone()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::with_session;
    use crate::ObfuscationConfig;
    use murk_core::ast::Expression;
    use std::collections::HashMap;

    /// Follows the jumps from the entry and records the statements met on the way.
    fn execution_order(block: &[Statement]) -> Vec<Statement> {
        let positions: HashMap<&str, usize> = block
            .iter()
            .enumerate()
            .filter_map(|(index, s)| match s {
                Statement::Label(name) => Some((name.as_str(), index)),
                _ => None,
            })
            .collect();
        let mut executed = Vec::new();
        let mut pc = 0;
        while pc < block.len() {
            match &block[pc] {
                Statement::Goto(label) => pc = positions[label.as_str()],
                Statement::Label(_) => pc += 1,
                other => {
                    executed.push(other.clone());
                    pc += 1;
                }
            }
        }
        executed
    }

    #[test]
    fn execution_order_survives_shuffling() {
        with_session(ObfuscationConfig::default(), |session| {
            let statements: Vec<Statement> = (0..8)
                .map(|n| Statement::assign("х", Expression::number(f64::from(n))))
                .collect();
            let shuffled = shuffle(session, statements.clone());
            assert_eq!(shuffled.len(), 8 * 3 + 2);
            assert_eq!(execution_order(&shuffled), statements);
        });
    }

    #[test]
    fn empty_blocks_stay_empty() {
        with_session(ObfuscationConfig::default(), |session| {
            assert!(shuffle(session, Vec::new()).is_empty());
        });
    }
}
