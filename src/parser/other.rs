use crate::error::Result;
use crate::lexer::Token;
use super::ast::*;
use super::Parser;

impl Parser {
    pub(super) fn parse_begin(&mut self) -> Result<Statement> {
        self.advance(); // BEGIN or START
        if *self.peek() == Token::Transaction {
            self.advance();
        }
        let mut read_only = false;
        if *self.peek() == Token::Read {
            self.advance();
            match self.peek() {
                Token::Only => {
                    self.advance();
                    read_only = true;
                }
                Token::Write => {
                    self.advance();
                }
                _ => {
                    return Err(self.error_with_context(format!(
                        "Expected ONLY or WRITE after READ, found {}",
                        self.token_brief(self.peek())
                    )))
                }
            }
        }
        Ok(Statement::Begin { read_only })
    }

    pub(super) fn parse_show(&mut self) -> Result<Statement> {
        self.expect(Token::Show)?;
        self.expect(Token::Tables)?;
        Ok(Statement::ShowTables)
    }

    pub(super) fn parse_describe(&mut self) -> Result<Statement> {
        self.advance(); // DESCRIBE or DESC
        let table_name = self.consume_identifier()?;
        Ok(Statement::Describe(table_name))
    }
}
