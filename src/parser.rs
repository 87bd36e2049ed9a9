use std::collections::HashMap;
use std::rc::Rc;

use anyhow::{Result, bail};

use crate::lexer::Lexer;
use crate::runtime::class::{Class, Method};
use crate::statement::{BinaryOperator, Comparator, Statement};
use crate::token::{Token, TokenKind};

/// Recursive-descent parser over the lexer cursor.
///
/// Classes are registered while parsing: `Name(args)` only parses to an
/// instantiation when `Name` was declared earlier, and a parent named in
/// `class B(A):` must already exist.
pub struct Parser {
    lexer: Lexer,
    classes: HashMap<String, Rc<Class>>,
}

pub fn parse(lexer: Lexer) -> Result<Statement> {
    Parser::new(lexer).parse_program()
}

impl Parser {
    pub fn new(lexer: Lexer) -> Self {
        Self {
            lexer,
            classes: HashMap::new(),
        }
    }

    pub fn parse_program(mut self) -> Result<Statement> {
        let mut statements = Vec::new();
        while !self.check(&TokenKind::Eof) {
            if self.consume_newlines() {
                continue;
            }
            statements.push(self.parse_statement()?);
        }
        Ok(Statement::Compound { statements })
    }

    fn parse_statement(&mut self) -> Result<Statement> {
        if self.check(&TokenKind::Class) {
            return self.parse_class_definition();
        }
        if self.check(&TokenKind::If) {
            return self.parse_if_else();
        }
        if self.check(&TokenKind::Return) {
            return self.parse_return();
        }
        if self.check(&TokenKind::Print) {
            return self.parse_print();
        }
        self.parse_assignment_or_expression()
    }

    fn parse_class_definition(&mut self) -> Result<Statement> {
        self.expect(&TokenKind::Class)?;
        let name = self.expect_id()?;

        let parent = if self.check_char('(') {
            self.advance();
            let parent_name = self.expect_id()?;
            self.expect_char(')')?;
            match self.classes.get(&parent_name) {
                Some(parent) => Some(parent.clone()),
                None => bail!(
                    "Unknown parent class '{parent_name}' at position {}",
                    self.position()
                ),
            }
        } else {
            None
        };

        self.expect_char(':')?;
        self.expect(&TokenKind::Newline)?;
        self.expect(&TokenKind::Indent)?;
        let mut methods = Vec::new();
        while !self.check(&TokenKind::Dedent) && !self.check(&TokenKind::Eof) {
            if self.consume_newlines() {
                continue;
            }
            methods.push(self.parse_method()?);
        }
        self.expect(&TokenKind::Dedent)?;

        let class = Rc::new(Class::new(name.clone(), methods, parent));
        self.classes.insert(name, class.clone());
        Ok(Statement::class_definition(class))
    }

    fn parse_method(&mut self) -> Result<Method> {
        self.expect(&TokenKind::Def)?;
        let name = self.expect_id()?;

        self.expect_char('(')?;
        let mut formal_params = Vec::new();
        if !self.check_char(')') {
            formal_params.push(self.expect_id()?);
            while self.check_char(',') {
                self.advance();
                formal_params.push(self.expect_id()?);
            }
        }
        self.expect_char(')')?;
        self.expect_char(':')?;

        let body = self.parse_suite()?;
        Ok(Method {
            name,
            formal_params,
            body: Rc::new(Statement::MethodBody {
                body: Box::new(body),
            }),
        })
    }

    fn parse_suite(&mut self) -> Result<Statement> {
        self.expect(&TokenKind::Newline)?;
        self.expect(&TokenKind::Indent)?;
        let mut statements = Vec::new();
        while !self.check(&TokenKind::Dedent) && !self.check(&TokenKind::Eof) {
            if self.consume_newlines() {
                continue;
            }
            statements.push(self.parse_statement()?);
        }
        self.expect(&TokenKind::Dedent)?;
        Ok(Statement::Compound { statements })
    }

    fn parse_if_else(&mut self) -> Result<Statement> {
        self.expect(&TokenKind::If)?;
        let condition = self.parse_expression()?;
        self.expect_char(':')?;
        let if_body = self.parse_suite()?;

        let else_body = if self.check(&TokenKind::Else) {
            self.advance();
            self.expect_char(':')?;
            Some(Box::new(self.parse_suite()?))
        } else {
            None
        };

        Ok(Statement::IfElse {
            condition: Box::new(condition),
            if_body: Box::new(if_body),
            else_body,
        })
    }

    fn parse_return(&mut self) -> Result<Statement> {
        self.expect(&TokenKind::Return)?;
        if self.check(&TokenKind::Newline) {
            self.advance();
            return Ok(Statement::Return {
                statement: Box::new(Statement::none()),
            });
        }
        let value = self.parse_expression()?;
        self.expect(&TokenKind::Newline)?;
        Ok(Statement::Return {
            statement: Box::new(value),
        })
    }

    fn parse_print(&mut self) -> Result<Statement> {
        self.expect(&TokenKind::Print)?;
        let mut args = Vec::new();
        if !self.check(&TokenKind::Newline) && !self.check(&TokenKind::Eof) {
            args.push(self.parse_expression()?);
            while self.check_char(',') {
                self.advance();
                args.push(self.parse_expression()?);
            }
        }
        self.expect(&TokenKind::Newline)?;
        Ok(Statement::Print { args })
    }

    fn parse_assignment_or_expression(&mut self) -> Result<Statement> {
        let expr = self.parse_expression()?;
        if self.check_char('=') {
            self.advance();
            let rhs = self.parse_expression()?;
            self.expect(&TokenKind::Newline)?;
            return self.make_assignment(expr, rhs);
        }
        self.expect(&TokenKind::Newline)?;
        Ok(expr)
    }

    fn make_assignment(&self, target: Statement, rhs: Statement) -> Result<Statement> {
        match target {
            Statement::VariableValue { mut dotted_ids } => {
                if dotted_ids.len() == 1 {
                    let var = dotted_ids.remove(0);
                    Ok(Statement::Assignment {
                        var,
                        rhs: Box::new(rhs),
                    })
                } else {
                    let field_name = dotted_ids.pop().expect("dotted path checked as non-empty");
                    Ok(Statement::FieldAssignment {
                        object: Box::new(Statement::VariableValue { dotted_ids }),
                        field_name,
                        rhs: Box::new(rhs),
                    })
                }
            }
            _ => bail!("Invalid assignment target at position {}", self.position()),
        }
    }

    fn parse_expression(&mut self) -> Result<Statement> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Statement> {
        let mut lhs = self.parse_and()?;
        while self.check(&TokenKind::Or) {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Statement::Or {
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Statement> {
        let mut lhs = self.parse_not()?;
        while self.check(&TokenKind::And) {
            self.advance();
            let rhs = self.parse_not()?;
            lhs = Statement::And {
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Statement> {
        if self.check(&TokenKind::Not) {
            self.advance();
            let argument = self.parse_not()?;
            return Ok(Statement::Not {
                argument: Box::new(argument),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Statement> {
        let lhs = self.parse_additive()?;
        let cmp = if self.check(&TokenKind::Eq) {
            Some(Comparator::Equal)
        } else if self.check(&TokenKind::NotEq) {
            Some(Comparator::NotEqual)
        } else if self.check_char('<') {
            Some(Comparator::Less)
        } else if self.check_char('>') {
            Some(Comparator::Greater)
        } else if self.check(&TokenKind::LessOrEq) {
            Some(Comparator::LessOrEqual)
        } else if self.check(&TokenKind::GreaterOrEq) {
            Some(Comparator::GreaterOrEqual)
        } else {
            None
        };

        let Some(cmp) = cmp else {
            return Ok(lhs);
        };
        self.advance();
        let rhs = self.parse_additive()?;
        Ok(Statement::Comparison {
            cmp,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    fn parse_additive(&mut self) -> Result<Statement> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = if self.check_char('+') {
                BinaryOperator::Add
            } else if self.check_char('-') {
                BinaryOperator::Sub
            } else {
                break;
            };
            self.advance();
            let rhs = self.parse_term()?;
            lhs = Statement::BinaryOp {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Statement> {
        let mut lhs = self.parse_atom()?;
        loop {
            let op = if self.check_char('*') {
                BinaryOperator::Mult
            } else if self.check_char('/') {
                BinaryOperator::Div
            } else {
                break;
            };
            self.advance();
            let rhs = self.parse_atom()?;
            lhs = Statement::BinaryOp {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_atom(&mut self) -> Result<Statement> {
        let kind = self.lexer.current_token().kind.clone();
        let atom = match kind {
            TokenKind::Number(value) => {
                self.advance();
                Statement::number(value)
            }
            TokenKind::String(value) => {
                self.advance();
                Statement::string(value)
            }
            TokenKind::True => {
                self.advance();
                Statement::boolean(true)
            }
            TokenKind::False => {
                self.advance();
                Statement::boolean(false)
            }
            TokenKind::None => {
                self.advance();
                Statement::none()
            }
            TokenKind::Char('(') => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect_char(')')?;
                expr
            }
            TokenKind::Id(_) => self.parse_name_expression()?,
            _ => return Err(self.unexpected("an expression")),
        };
        self.parse_method_chain(atom)
    }

    fn parse_name_expression(&mut self) -> Result<Statement> {
        let name = self.expect_id()?;

        // str(x) renders a value into a String.
        if name == "str" && self.check_char('(') {
            self.advance();
            let argument = self.parse_expression()?;
            self.expect_char(')')?;
            return Ok(Statement::Stringify {
                argument: Box::new(argument),
            });
        }

        if self.check_char('(') {
            let Some(class) = self.classes.get(&name).cloned() else {
                bail!("Unknown class '{name}' at position {}", self.position());
            };
            let args = self.parse_call_args()?;
            return Ok(Statement::new_instance(class, args));
        }

        let mut dotted_ids = vec![name];
        while self.check_char('.') {
            self.advance();
            let attr = self.expect_id()?;
            if self.check_char('(') {
                let args = self.parse_call_args()?;
                return Ok(Statement::MethodCall {
                    object: Box::new(Statement::VariableValue { dotted_ids }),
                    method: attr,
                    args,
                });
            }
            dotted_ids.push(attr);
        }
        Ok(Statement::VariableValue { dotted_ids })
    }

    /// Applies trailing `.method(args)` segments; only calls can chain off
    /// an instantiation or another call.
    fn parse_method_chain(&mut self, mut expr: Statement) -> Result<Statement> {
        while self.check_char('.') {
            self.advance();
            let method = self.expect_id()?;
            let args = self.parse_call_args()?;
            expr = Statement::MethodCall {
                object: Box::new(expr),
                method,
                args,
            };
        }
        Ok(expr)
    }

    fn parse_call_args(&mut self) -> Result<Vec<Statement>> {
        self.expect_char('(')?;
        let mut args = Vec::new();
        if !self.check_char(')') {
            args.push(self.parse_expression()?);
            while self.check_char(',') {
                self.advance();
                args.push(self.parse_expression()?);
            }
        }
        self.expect_char(')')?;
        Ok(args)
    }

    fn consume_newlines(&mut self) -> bool {
        let mut consumed = false;
        while self.check(&TokenKind::Newline) {
            consumed = true;
            self.advance();
        }
        consumed
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.lexer.current_token().kind == *kind
    }

    fn check_char(&self, c: char) -> bool {
        self.check(&TokenKind::Char(c))
    }

    fn advance(&mut self) -> Token {
        let token = self.lexer.current_token().clone();
        self.lexer.next_token();
        token
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<()> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(&format!("{kind:?}")))
        }
    }

    fn expect_char(&mut self, c: char) -> Result<()> {
        if self.check_char(c) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{c}'")))
        }
    }

    fn expect_id(&mut self) -> Result<String> {
        if let TokenKind::Id(name) = &self.lexer.current_token().kind {
            let name = name.clone();
            self.advance();
            return Ok(name);
        }
        Err(self.unexpected("an identifier"))
    }

    fn position(&self) -> usize {
        self.lexer.current_token().span.start
    }

    fn unexpected(&self, expected: &str) -> anyhow::Error {
        let token = self.lexer.current_token();
        anyhow::anyhow!(
            "Expected {expected}, got {:?} at position {}",
            token.kind,
            token.span.start
        )
    }
}
