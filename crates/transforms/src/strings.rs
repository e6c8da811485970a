//! String concealment.
//!
//! A literal is replaced by a call to a decoder routine synthesized once per
//! execution context. The routine receives the base64 text of the XOR-ed
//! characters and the key, and rebuilds the characters one by one.

use crate::camouflage::{hide, DEFAULT_COMPLEXITY};
use crate::delinearize::delinearize;
use crate::garbage::inject;
use crate::names::ROUTINE_NAME_LEN;
use crate::{Result, Session};
use base64::{engine::general_purpose, Engine as _};
use murk_core::ast::{
    BinaryOp, Directive, Expression, IfStatement, Loop, LoopKind, Parameter, Routine, Statement,
};
use rand::Rng;
use tracing::debug;

/// Character codes below this bound take the arithmetic branch of the decoder.
const BRANCH_BOUND: f64 = 65.0;

/// XORs every character with `key` and base64-encodes the UTF-8 result.
pub fn encode(value: &str, key: u32) -> String {
    let shifted: String = value.chars().map(|c| xor_char(c, key)).collect();
    general_purpose::STANDARD.encode(shifted.as_bytes())
}

/// Inverse of [`encode`].
pub fn decode(cipher: &str, key: u32) -> Option<String> {
    let bytes = general_purpose::STANDARD.decode(cipher).ok()?;
    let shifted = String::from_utf8(bytes).ok()?;
    Some(shifted.chars().map(|c| xor_char(c, key)).collect())
}

/// Keys stay below 128, so only the low seven bits of a code point change and a
/// valid scalar value never turns into a surrogate.
fn xor_char(c: char, key: u32) -> char {
    char::from_u32(u32::from(c) ^ key).unwrap_or(c)
}

/// Whether the platform decoder can rebuild `value`. `КодСимвола` and `Символ`
/// work on UTF-16 code units, so characters outside the BMP cannot round-trip.
pub fn is_concealable(value: &str) -> bool {
    value.chars().all(|c| c.len_utf16() == 1)
}

/// A decoder call yielding `value` at run time. Text the decoder cannot
/// rebuild is returned as a plain literal.
pub fn conceal(
    session: &mut Session,
    value: &str,
    directive: Option<Directive>,
) -> Result<Expression> {
    if !is_concealable(value) {
        debug!("leaving a literal with non-BMP characters in plain text");
        return Ok(Expression::string(value));
    }
    let key = session.rng().random_range(10..100u32);
    let cipher = encode(value, key);
    let decoder = decoder_for(session, directive)?;
    session.stats.strings_hidden += 1;
    let key = hide(session, Expression::number(f64::from(key)), DEFAULT_COMPLEXITY)?;
    Ok(Expression::call(decoder, vec![Expression::string(cipher), key]))
}

/// Name of the decoder routine for `directive`, synthesizing it on first use.
pub fn decoder_for(session: &mut Session, directive: Option<Directive>) -> Result<String> {
    if let Some(name) = session.decoder(directive) {
        return Ok(name.to_string());
    }
    let name = session.fresh_name(ROUTINE_NAME_LEN);
    let routine = build_decoder(session, name.clone(), directive)?;
    debug!(name = %name, ?directive, "synthesized string decoder");
    session.remember_decoder(directive, name.clone());
    session.add_routine(routine);
    Ok(name)
}

fn build_decoder(
    session: &mut Session,
    name: String,
    directive: Option<Directive>,
) -> Result<Routine> {
    let s = session.fresh_name_between(5, 10);
    let k = session.fresh_name_between(5, 10);
    let r = session.fresh_name_between(5, 10);
    let i = session.fresh_name_between(5, 10);
    let c = session.fresh_name_between(5, 10);
    let var = Expression::var;

    let binary = hide(
        session,
        Expression::call("Base64Значение", vec![var(&s)]),
        DEFAULT_COMPLEXITY,
    )?;
    let text = Expression::call("ПолучитьСтрокуИзДвоичныхДанных", vec![binary]);
    let empty = hide(session, Expression::string(""), DEFAULT_COMPLEXITY)?;
    let code = hide(
        session,
        Expression::call("КодСимвола", vec![var(&s), var(&i)]),
        DEFAULT_COMPLEXITY,
    )?;

    // c + k - 2 * ПобитовоеИ(c, k)
    let arithmetic_xor = Expression::binary(
        BinaryOp::Sub,
        Expression::binary(BinaryOp::Add, var(&c), var(&k)),
        Expression::binary(
            BinaryOp::Mul,
            Expression::number(2.0),
            Expression::call("ПобитовоеИ", vec![var(&c), var(&k)]),
        ),
    );
    let low = hide(
        session,
        append_char(&r, arithmetic_xor),
        DEFAULT_COMPLEXITY,
    )?;

    // ПобитовоеИли(ПобитовоеИНе(c, k), ПобитовоеИНе(k, c))
    let left = hide(
        session,
        Expression::call("ПобитовоеИНе", vec![var(&c), var(&k)]),
        DEFAULT_COMPLEXITY,
    )?;
    let right = hide(
        session,
        Expression::call("ПобитовоеИНе", vec![var(&k), var(&c)]),
        DEFAULT_COMPLEXITY,
    )?;
    let high = hide(
        session,
        append_char(&r, Expression::call("ПобитовоеИли", vec![left, right])),
        DEFAULT_COMPLEXITY,
    )?;

    let mut branch = IfStatement::new(
        Expression::binary(BinaryOp::Lt, var(&c), Expression::number(BRANCH_BOUND)),
        vec![Statement::assign(&r, low)],
    );
    branch.else_block = Some(vec![Statement::assign(&r, high)]);

    let mut loop_body = vec![Statement::assign(&c, code), Statement::If(branch)];
    inject(session, &mut loop_body, directive)?;
    let lp = Loop {
        kind: LoopKind::Range {
            var: i.clone(),
            from: Expression::number(1.0),
            to: Expression::call("СтрДлина", vec![var(&s)]),
        },
        body: loop_body,
    };

    let mut body = vec![
        Statement::assign(&s, text),
        Statement::assign(&r, empty),
    ];
    body.extend(delinearize(session, lp)?);
    body.push(Statement::Return(Some(var(&r))));
    inject(session, &mut body, directive)?;

    let mut routine = Routine::function(name, directive);
    routine.params = vec![Parameter::named(s), Parameter::named(k)];
    routine.body = body;
    Ok(routine)
}

/// `r + Символ(code)`
fn append_char(accumulator: &str, code: Expression) -> Expression {
    Expression::binary(
        BinaryOp::Add,
        Expression::var(accumulator),
        Expression::call("Символ", vec![code]),
    )
}
