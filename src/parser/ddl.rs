use crate::error::Result;
use crate::lexer::Token;
use crate::types::DataType;
use super::ast::*;
use super::Parser;

impl Parser {
    pub(super) fn parse_create(&mut self) -> Result<Statement> {
        self.push_context("CREATE statement");
        self.expect(Token::Create)?;

        let result = match self.peek() {
            Token::Table => self.parse_create_table(),
            Token::Eof => Err(self.error_with_context("Expected TABLE after CREATE".to_string())),
            _ => Err(self.error_with_context("Expected TABLE after CREATE".to_string())),
        };

        self.pop_context();
        result
    }

    pub(super) fn parse_create_table(&mut self) -> Result<Statement> {
        self.push_context("CREATE TABLE statement");
        self.expect(Token::Table)?;

        let if_not_exists = if *self.peek() == Token::If {
            self.advance();
            self.expect(Token::Not)?;
            self.expect(Token::Exists)?;
            true
        } else {
            false
        };

        let table_name = self.consume_identifier()?;
        self.expect(Token::LeftParen)?;

        let mut columns = Vec::new();
        loop {
            let col_name = self.consume_identifier()?;
            let data_type = self.parse_data_type()?;

            let (nullable, primary_key, auto_increment, unique, default) = self.parse_column_constraints()?;

            columns.push(ColumnDefAst {
                name: col_name,
                data_type,
                nullable,
                primary_key,
                auto_increment,
                unique,
                default,
            });

            if *self.peek() == Token::Comma {
                self.advance();
            } else {
                break;
            }
        }

        self.expect(Token::RightParen)?;
        self.pop_context();

        Ok(Statement::CreateTable(CreateTableStmt { table_name, columns, if_not_exists }))
    }

    /// Parse column constraints (NOT NULL, PRIMARY KEY, AUTO_INCREMENT, UNIQUE, DEFAULT, etc.)
    /// Returns: (nullable, primary_key, auto_increment, unique, default)
    pub(super) fn parse_column_constraints(&mut self) -> Result<(bool, bool, bool, bool, Option<Expr>)> {
        let mut nullable = true;
        let mut primary_key = false;
        let mut auto_increment = false;
        let mut unique = false;
        let mut default = None;

        loop {
            match self.peek() {
                Token::Not => {
                    self.advance();
                    self.expect(Token::Null)?;
                    nullable = false;
                }
                Token::Null => {
                    self.advance();
                    nullable = true;
                }
                Token::Primary => {
                    self.advance();
                    self.expect(Token::Key)?;
                    primary_key = true;
                    nullable = false;
                }
                Token::AutoIncrement => {
                    self.advance();
                    auto_increment = true;
                }
                Token::Unique => {
                    self.advance();
                    if *self.peek() == Token::Key {
                        self.advance();
                    }
                    unique = true;
                }
                Token::Default => {
                    self.advance();
                    default = Some(self.parse_primary_expression()?);
                }
                _ => break,
            }
        }

        Ok((nullable, primary_key, auto_increment, unique, default))
    }

    pub(super) fn parse_drop(&mut self) -> Result<Statement> {
        self.push_context("DROP statement");
        self.expect(Token::Drop)?;

        let result = match self.peek() {
            Token::Table => {
                self.advance();
                let if_exists = if *self.peek() == Token::If {
                    self.advance();
                    self.expect(Token::Exists)?;
                    true
                } else {
                    false
                };
                let table_name = self.consume_identifier()?;
                Ok(Statement::DropTable { table_name, if_exists })
            }
            Token::Eof => Err(self.error_with_context("Expected TABLE after DROP".to_string())),
            _ => Err(self.error_with_context("Expected TABLE after DROP".to_string())),
        };

        self.pop_context();
        result
    }

    pub(super) fn parse_truncate(&mut self) -> Result<Statement> {
        self.expect(Token::Truncate)?;
        self.expect(Token::Table)?;
        let table_name = self.consume_identifier()?;
        Ok(Statement::TruncateTable(table_name))
    }

    pub(super) fn parse_data_type(&mut self) -> Result<DataType> {
        self.check_eof("data type")?;
        let dt = match self.peek().clone() {
            Token::Int | Token::Integer | Token::Bigint => {
                self.advance();
                DataType::Integer
            }
            Token::Float | Token::Double | Token::Real => {
                self.advance();
                DataType::Float
            }
            Token::Varchar => {
                self.advance();
                let len = if *self.peek() == Token::LeftParen {
                    self.advance();
                    let len = match self.peek().clone() {
                        Token::NumberLiteral(n) => {
                            self.advance();
                            Some(n.parse().map_err(|_| {
                                self.error_with_context("Invalid VARCHAR length".to_string())
                            })?)
                        }
                        _ => None,
                    };
                    self.expect(Token::RightParen)?;
                    len
                } else {
                    None
                };
                DataType::Varchar(len)
            }
            Token::Text => {
                self.advance();
                DataType::Text
            }
            Token::Boolean | Token::Bool => {
                self.advance();
                DataType::Boolean
            }
            Token::Json => {
                self.advance();
                DataType::Json
            }
            Token::Timestamp => {
                self.advance();
                DataType::Timestamp
            }
            Token::Blob => {
                self.advance();
                DataType::Blob
            }
            Token::Decimal => {
                self.advance();
                // Optional (precision, scale) is accepted and ignored: tinySQL's
                // Decimal column stores arbitrary precision already.
                if *self.peek() == Token::LeftParen {
                    self.advance();
                    while *self.peek() != Token::RightParen {
                        if *self.peek() == Token::Eof {
                            return Err(self.error_with_context("Unterminated DECIMAL(...) ".to_string()));
                        }
                        self.advance();
                    }
                    self.expect(Token::RightParen)?;
                }
                DataType::Decimal
            }
            Token::Uuid => {
                self.advance();
                DataType::Uuid
            }
            other => {
                return Err(self.error_with_context(format!("Expected data type, found {:?}", other)))
            }
        };
        Ok(dt)
    }
}
