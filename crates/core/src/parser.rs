//! Recursive-descent parser for BSL modules, statement lists and expressions.

use crate::ast::{
    BinaryOp, Call, Declaration, Directive, ElseIf, Expression, IfStatement, Literal, Loop,
    LoopKind, Module, ModuleVariable, Parameter, Routine, RoutineKind, Statement, VariableDeclaration,
};
use crate::lexer::{tokenize, Token, TokenKind};
use crate::result::{Error, Result};

/// Parses a complete module.
pub fn parse_module(source: &str) -> Result<Module> {
    let mut parser = Parser::new(source)?;
    let module = parser.module()?;
    parser.expect_eof()?;
    tracing::debug!(
        declarations = module.declarations.len(),
        body = module.body.len(),
        "parsed module"
    );
    Ok(module)
}

/// Parses a bare statement list, as accepted by `Выполнить`.
pub fn parse_statements(source: &str) -> Result<Vec<Statement>> {
    let mut parser = Parser::new(source)?;
    let statements = parser.block()?;
    parser.expect_eof()?;
    Ok(statements)
}

/// Parses a single expression, as accepted by `Вычислить`.
pub fn parse_expression(source: &str) -> Result<Expression> {
    let mut parser = Parser::new(source)?;
    let expression = parser.expression()?;
    parser.expect_eof()?;
    Ok(expression)
}

/// True when `word` is reserved and cannot name a variable, label or routine.
pub fn is_reserved(word: &str) -> bool {
    Keyword::from_word(word).is_some()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Keyword {
    Procedure,
    Function,
    EndProcedure,
    EndFunction,
    Var,
    Export,
    Val,
    If,
    Then,
    ElsIf,
    Else,
    EndIf,
    While,
    For,
    Each,
    In,
    To,
    Do,
    EndDo,
    Return,
    Raise,
    Try,
    Except,
    EndTry,
    Break,
    Continue,
    Goto,
    New,
    And,
    Or,
    Not,
    True,
    False,
    Undefined,
    Null,
}

impl Keyword {
    fn from_word(word: &str) -> Option<Self> {
        let keyword = match word.to_lowercase().as_str() {
            "процедура" | "procedure" => Self::Procedure,
            "функция" | "function" => Self::Function,
            "конецпроцедуры" | "endprocedure" => Self::EndProcedure,
            "конецфункции" | "endfunction" => Self::EndFunction,
            "перем" | "var" => Self::Var,
            "экспорт" | "export" => Self::Export,
            "знач" | "val" => Self::Val,
            "если" | "if" => Self::If,
            "тогда" | "then" => Self::Then,
            "иначеесли" | "elsif" => Self::ElsIf,
            "иначе" | "else" => Self::Else,
            "конецесли" | "endif" => Self::EndIf,
            "пока" | "while" => Self::While,
            "для" | "for" => Self::For,
            "каждого" | "each" => Self::Each,
            "из" | "in" => Self::In,
            "по" | "to" => Self::To,
            "цикл" | "do" => Self::Do,
            "конеццикла" | "enddo" => Self::EndDo,
            "возврат" | "return" => Self::Return,
            "вызватьисключение" | "raise" => Self::Raise,
            "попытка" | "try" => Self::Try,
            "исключение" | "except" => Self::Except,
            "конецпопытки" | "endtry" => Self::EndTry,
            "прервать" | "break" => Self::Break,
            "продолжить" | "continue" => Self::Continue,
            "перейти" | "goto" => Self::Goto,
            "новый" | "new" => Self::New,
            "и" | "and" => Self::And,
            "или" | "or" => Self::Or,
            "не" | "not" => Self::Not,
            "истина" | "true" => Self::True,
            "ложь" | "false" => Self::False,
            "неопределено" | "undefined" => Self::Undefined,
            "null" => Self::Null,
            _ => return None,
        };
        Some(keyword)
    }

    /// Keywords that close a statement list.
    fn ends_block(self) -> bool {
        matches!(
            self,
            Self::EndProcedure
                | Self::EndFunction
                | Self::ElsIf
                | Self::Else
                | Self::EndIf
                | Self::EndDo
                | Self::Except
                | Self::EndTry
                | Self::Procedure
                | Self::Function
                | Self::Var
        )
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(source: &str) -> Result<Self> {
        Ok(Self {
            tokens: tokenize(source)?,
            pos: 0,
        })
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn error_at(&self, token: &Token, message: impl Into<String>) -> Error {
        Error::Parse {
            line: token.line,
            column: token.column,
            message: message.into(),
        }
    }

    fn error(&self, message: impl Into<String>) -> Error {
        self.error_at(self.peek(), message)
    }

    fn keyword(&self) -> Option<Keyword> {
        match self.peek_kind() {
            TokenKind::Ident(word) => Keyword::from_word(word),
            _ => None,
        }
    }

    fn at_keyword(&self, keyword: Keyword) -> bool {
        self.keyword() == Some(keyword)
    }

    fn eat_keyword(&mut self, keyword: Keyword) -> bool {
        if self.at_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Result<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error(format!("expected {keyword:?}, found {:?}", self.peek_kind())))
        }
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek_kind() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<()> {
        if self.eat(&kind) {
            Ok(())
        } else {
            Err(self.error(format!("expected {kind:?}, found {:?}", self.peek_kind())))
        }
    }

    fn expect_eof(&mut self) -> Result<()> {
        match self.peek_kind() {
            TokenKind::Eof => Ok(()),
            other => Err(self.error(format!("unexpected {other:?}"))),
        }
    }

    /// Any identifier, keyword spellings included.
    fn name(&mut self) -> Result<String> {
        match self.peek_kind().clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(self.error(format!("expected a name, found {other:?}"))),
        }
    }

    /// An identifier that is not a reserved word.
    fn identifier(&mut self) -> Result<String> {
        if let Some(keyword) = self.keyword() {
            return Err(self.error(format!("unexpected keyword {keyword:?}")));
        }
        self.name()
    }

    fn skip_semicolons(&mut self) {
        while self.eat(&TokenKind::Semicolon) {}
    }

    fn module(&mut self) -> Result<Module> {
        let mut module = Module::default();
        loop {
            self.skip_semicolons();
            let directive = self.directives()?;
            match self.keyword() {
                Some(Keyword::Var) => {
                    let decl = self.variables(directive)?;
                    module.declarations.push(Declaration::Variables(decl));
                }
                Some(Keyword::Procedure) | Some(Keyword::Function) => {
                    let routine = self.routine(directive)?;
                    module.declarations.push(Declaration::Routine(routine));
                }
                _ => {
                    if directive.is_some() {
                        return Err(self.error("directive must precede a declaration"));
                    }
                    break;
                }
            }
        }
        module.body = self.block()?;
        Ok(module)
    }

    fn directives(&mut self) -> Result<Option<Directive>> {
        let mut directive = None;
        while let TokenKind::Directive(name) = self.peek_kind().clone() {
            let token = self.advance();
            directive = Some(
                Directive::from_name(&name)
                    .ok_or_else(|| self.error_at(&token, format!("unknown directive &{name}")))?,
            );
        }
        Ok(directive)
    }

    fn variables(&mut self, directive: Option<Directive>) -> Result<VariableDeclaration> {
        self.expect_keyword(Keyword::Var)?;
        let mut variables = Vec::new();
        loop {
            let name = self.identifier()?;
            let export = self.eat_keyword(Keyword::Export);
            variables.push(ModuleVariable { name, export });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::Semicolon)?;
        Ok(VariableDeclaration {
            directive,
            variables,
        })
    }

    fn routine(&mut self, directive: Option<Directive>) -> Result<Routine> {
        let (kind, end) = if self.eat_keyword(Keyword::Procedure) {
            (RoutineKind::Procedure, Keyword::EndProcedure)
        } else {
            self.expect_keyword(Keyword::Function)?;
            (RoutineKind::Function, Keyword::EndFunction)
        };
        let name = self.identifier()?;
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.eat(&TokenKind::RParen) {
            loop {
                let by_value = self.eat_keyword(Keyword::Val);
                let name = self.identifier()?;
                let default = if self.eat(&TokenKind::Eq) {
                    Some(self.unary()?)
                } else {
                    None
                };
                params.push(Parameter {
                    name,
                    by_value,
                    default,
                });
                if self.eat(&TokenKind::RParen) {
                    break;
                }
                self.expect(TokenKind::Comma)?;
            }
        }
        let export = self.eat_keyword(Keyword::Export);
        let body = self.block()?;
        self.expect_keyword(end)?;
        Ok(Routine {
            kind,
            name,
            params,
            body,
            export,
            directive,
        })
    }

    fn block(&mut self) -> Result<Vec<Statement>> {
        let mut statements = Vec::new();
        loop {
            self.skip_semicolons();
            if matches!(self.peek_kind(), TokenKind::Eof | TokenKind::Directive(_)) {
                break;
            }
            if self.keyword().is_some_and(Keyword::ends_block) {
                break;
            }
            statements.push(self.statement()?);
        }
        Ok(statements)
    }

    fn statement(&mut self) -> Result<Statement> {
        if let TokenKind::Label(name) = self.peek_kind().clone() {
            self.advance();
            self.expect(TokenKind::Colon)?;
            return Ok(Statement::Label(name));
        }

        match self.keyword() {
            Some(Keyword::If) => {
                self.advance();
                self.if_statement()
            }
            Some(Keyword::While) => {
                self.advance();
                let condition = self.expression()?;
                let body = self.loop_body()?;
                Ok(Statement::Loop(Loop {
                    kind: LoopKind::While(condition),
                    body,
                }))
            }
            Some(Keyword::For) => {
                self.advance();
                self.for_statement()
            }
            Some(Keyword::Return) => {
                self.advance();
                Ok(Statement::Return(self.optional_expression()?))
            }
            Some(Keyword::Raise) => {
                self.advance();
                Ok(Statement::Throw(self.optional_expression()?))
            }
            Some(Keyword::Try) => {
                self.advance();
                let body = self.block()?;
                self.expect_keyword(Keyword::Except)?;
                let handler = self.block()?;
                self.expect_keyword(Keyword::EndTry)?;
                Ok(Statement::Try { body, handler })
            }
            Some(Keyword::Break) => {
                self.advance();
                Ok(Statement::Break)
            }
            Some(Keyword::Continue) => {
                self.advance();
                Ok(Statement::Continue)
            }
            Some(Keyword::Goto) => {
                self.advance();
                match self.advance() {
                    Token {
                        kind: TokenKind::Label(name),
                        ..
                    } => Ok(Statement::Goto(name)),
                    token => Err(self.error_at(&token, "expected a label after Перейти")),
                }
            }
            _ => {
                // A target is a variable, member or index; `=` after it assigns.
                let target = self.postfix()?;
                if self.eat(&TokenKind::Eq) {
                    let value = self.expression()?;
                    Ok(Statement::Assign { target, value })
                } else {
                    Ok(Statement::Expression(target))
                }
            }
        }
    }

    fn optional_expression(&mut self) -> Result<Option<Expression>> {
        let ends = matches!(self.peek_kind(), TokenKind::Semicolon | TokenKind::Eof)
            || self.keyword().is_some_and(Keyword::ends_block);
        if ends {
            Ok(None)
        } else {
            self.expression().map(Some)
        }
    }

    fn if_statement(&mut self) -> Result<Statement> {
        let condition = self.expression()?;
        self.expect_keyword(Keyword::Then)?;
        let mut statement = IfStatement::new(condition, self.block()?);
        loop {
            if self.eat_keyword(Keyword::ElsIf) {
                let condition = self.expression()?;
                self.expect_keyword(Keyword::Then)?;
                let block = self.block()?;
                statement.else_ifs.push(ElseIf { condition, block });
            } else if self.eat_keyword(Keyword::Else) {
                statement.else_block = Some(self.block()?);
            } else {
                self.expect_keyword(Keyword::EndIf)?;
                return Ok(Statement::If(statement));
            }
        }
    }

    fn for_statement(&mut self) -> Result<Statement> {
        if self.eat_keyword(Keyword::Each) {
            let var = self.identifier()?;
            self.expect_keyword(Keyword::In)?;
            let collection = self.expression()?;
            let body = self.loop_body()?;
            return Ok(Statement::Loop(Loop {
                kind: LoopKind::ForEach { var, collection },
                body,
            }));
        }
        let var = self.identifier()?;
        self.expect(TokenKind::Eq)?;
        let from = self.expression()?;
        self.expect_keyword(Keyword::To)?;
        let to = self.expression()?;
        let body = self.loop_body()?;
        Ok(Statement::Loop(Loop {
            kind: LoopKind::Range { var, from, to },
            body,
        }))
    }

    fn loop_body(&mut self) -> Result<Vec<Statement>> {
        self.expect_keyword(Keyword::Do)?;
        let body = self.block()?;
        self.expect_keyword(Keyword::EndDo)?;
        Ok(body)
    }

    fn expression(&mut self) -> Result<Expression> {
        let mut left = self.and_expression()?;
        while self.eat_keyword(Keyword::Or) {
            let right = self.and_expression()?;
            left = Expression::binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn and_expression(&mut self) -> Result<Expression> {
        let mut left = self.not_expression()?;
        while self.eat_keyword(Keyword::And) {
            let right = self.not_expression()?;
            left = Expression::binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn not_expression(&mut self) -> Result<Expression> {
        if self.eat_keyword(Keyword::Not) {
            let inner = self.not_expression()?;
            return Ok(Expression::Not(Box::new(inner)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expression> {
        let mut left = self.additive()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Eq => BinaryOp::Eq,
                TokenKind::NotEq => BinaryOp::NotEq,
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::LtEq => BinaryOp::LtEq,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::GtEq => BinaryOp::GtEq,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.additive()?;
            left = Expression::binary(op, left, right);
        }
    }

    fn additive(&mut self) -> Result<Expression> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.multiplicative()?;
            left = Expression::binary(op, left, right);
        }
    }

    fn multiplicative(&mut self) -> Result<Expression> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.unary()?;
            left = Expression::binary(op, left, right);
        }
    }

    fn unary(&mut self) -> Result<Expression> {
        if self.eat(&TokenKind::Minus) {
            let inner = self.unary()?;
            return Ok(match inner {
                Expression::Literal(Literal::Number(value)) => Expression::number(-value),
                other => Expression::Neg(Box::new(other)),
            });
        }
        if self.eat(&TokenKind::Plus) {
            return self.unary();
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expression> {
        let mut expression = self.primary()?;
        loop {
            if self.eat(&TokenKind::Dot) {
                let name = self.name()?;
                if self.at_paren() {
                    let args = self.arguments()?;
                    expression = Expression::Chain {
                        base: Box::new(expression),
                        call: Call { name, args },
                    };
                } else {
                    expression = Expression::Member {
                        base: Box::new(expression),
                        name,
                    };
                }
            } else if self.eat(&TokenKind::LBracket) {
                let index = self.expression()?;
                self.expect(TokenKind::RBracket)?;
                expression = Expression::Index {
                    base: Box::new(expression),
                    index: Box::new(index),
                };
            } else {
                return Ok(expression);
            }
        }
    }

    fn at_paren(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::LParen)
    }

    fn arguments(&mut self) -> Result<Vec<Expression>> {
        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        if self.eat(&TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            if matches!(self.peek_kind(), TokenKind::Comma | TokenKind::RParen) {
                return Err(self.error("omitted arguments are not supported"));
            }
            args.push(self.expression()?);
            if self.eat(&TokenKind::RParen) {
                return Ok(args);
            }
            self.expect(TokenKind::Comma)?;
        }
    }

    fn primary(&mut self) -> Result<Expression> {
        let token = self.advance();
        let (line, column) = (token.line, token.column);
        let fail = |message: String| Error::Parse {
            line,
            column,
            message,
        };
        match token.kind {
            TokenKind::Number(value) => Ok(Expression::number(value)),
            TokenKind::Str(value) => Ok(Expression::string(value)),
            TokenKind::Date(digits) => Ok(Expression::Literal(Literal::Date(digits))),
            TokenKind::LParen => {
                let inner = self.expression()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::Question => {
                self.expect(TokenKind::LParen)?;
                let condition = self.expression()?;
                self.expect(TokenKind::Comma)?;
                let then = self.expression()?;
                self.expect(TokenKind::Comma)?;
                let otherwise = self.expression()?;
                self.expect(TokenKind::RParen)?;
                Ok(Expression::ternary(condition, then, otherwise))
            }
            TokenKind::Ident(word) => match Keyword::from_word(&word) {
                Some(Keyword::True) => Ok(Expression::Literal(Literal::Bool(true))),
                Some(Keyword::False) => Ok(Expression::Literal(Literal::Bool(false))),
                Some(Keyword::Undefined) => Ok(Expression::Literal(Literal::Undefined)),
                Some(Keyword::Null) => Ok(Expression::Literal(Literal::Null)),
                Some(Keyword::New) => {
                    let constructor = self.name()?;
                    let args = if self.at_paren() {
                        self.arguments()?
                    } else {
                        Vec::new()
                    };
                    Ok(Expression::New { constructor, args })
                }
                Some(keyword) => Err(fail(format!("unexpected keyword {keyword:?}"))),
                None => {
                    if self.at_paren() {
                        let args = self.arguments()?;
                        Ok(Expression::call(word, args))
                    } else {
                        Ok(Expression::Var(word))
                    }
                }
            },
            other => Err(fail(format!("unexpected {other:?}"))),
        }
    }
}
