// ABOUTME: Memoised per-module format-string globals, the printf declaration, and __print_binary

use inkwell::module::Linkage;
use inkwell::values::{FunctionValue, GlobalValue, IntValue, PointerValue};
use inkwell::AddressSpace;

use super::Engine;
use crate::error::CompileError;
use crate::ir::arithmetic::ir_emission;
use crate::token::Pos;

impl<'ctx> Engine<'ctx> {
    /// The external `printf` declaration, materialised at most once (§5).
    pub fn printf(&self) -> FunctionValue<'ctx> {
        if let Some(f) = *self.formats.printf.borrow() {
            return f;
        }
        let i32_type = self.context.i32_type();
        let ptr_type = self.context.ptr_type(AddressSpace::default());
        let fn_type = i32_type.fn_type(&[ptr_type.into()], true);
        let f = self.module.add_function("printf", fn_type, None);
        *self.formats.printf.borrow_mut() = Some(f);
        f
    }

    /// A NUL-terminated constant string global, cached by its own text so
    /// `%s\n`, `%c\n`, etc. are each emitted once per module.
    pub fn format_string(&self, text: &'static str) -> GlobalValue<'ctx> {
        if let Some(g) = self.formats.strings.borrow().get(text) {
            return *g;
        }
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0);
        let const_str = self.context.const_string(&bytes, false);
        let global = self.module.add_global(const_str.get_type(), None, "fmt");
        global.set_initializer(&const_str);
        global.set_constant(true);
        global.set_linkage(Linkage::Private);
        self.formats.strings.borrow_mut().insert(text, global);
        global
    }

    pub fn format_ptr(&self, text: &'static str) -> PointerValue<'ctx> {
        self.format_string(text).as_pointer_value()
    }

    fn ctlz_i64(&self) -> FunctionValue<'ctx> {
        if let Some(f) = self.module.get_function("llvm.ctlz.i64") {
            return f;
        }
        let i64_type = self.context.i64_type();
        let bool_type = self.context.bool_type();
        let fn_type = i64_type.fn_type(&[i64_type.into(), bool_type.into()], false);
        self.module.add_function("llvm.ctlz.i64", fn_type, None)
    }

    /// Builds (once) `void __print_binary(i64)`, printing `0b` followed by
    /// the value's bits with leading zeros suppressed, `0b0` for zero.
    pub fn print_binary_fn(&self, pos: Pos) -> Result<FunctionValue<'ctx>, CompileError> {
        if let Some(f) = *self.formats.print_binary.borrow() {
            return Ok(f);
        }

        let saved_block = self.builder.get_insert_block();
        let built = self.build_print_binary_fn(pos);
        if let Some(block) = saved_block {
            self.builder.position_at_end(block);
        }
        let function = built?;
        *self.formats.print_binary.borrow_mut() = Some(function);
        Ok(function)
    }

    fn build_print_binary_fn(&self, pos: Pos) -> Result<FunctionValue<'ctx>, CompileError> {
        let err = ir_emission(pos);

        let void_type = self.context.void_type();
        let i64_type = self.context.i64_type();
        let fn_type = void_type.fn_type(&[i64_type.into()], false);
        let function = self.module.add_function("__print_binary", fn_type, None);
        let arg = function
            .get_nth_param(0)
            .expect("__print_binary declared with one parameter")
            .into_int_value();

        let entry = self.context.append_basic_block(function, "entry");
        let zero_case = self.context.append_basic_block(function, "zero_case");
        let nonzero_case = self.context.append_basic_block(function, "nonzero_case");
        let loop_header = self.context.append_basic_block(function, "loop_header");
        let loop_body = self.context.append_basic_block(function, "loop_body");
        let done = self.context.append_basic_block(function, "done");

        let printf = self.printf();
        let prefix = self.format_ptr("0b");
        let zero_digit = self.format_ptr("0");
        let digit_fmt = self.format_ptr("%c");
        let newline = self.format_ptr("\n");

        self.builder.position_at_end(entry);
        self.builder
            .build_call(printf, &[prefix.into()], "print_prefix")
            .map_err(&err)?;
        let zero = i64_type.const_zero();
        let is_zero = self
            .builder
            .build_int_compare(inkwell::IntPredicate::EQ, arg, zero, "is_zero")
            .map_err(&err)?;
        self.builder
            .build_conditional_branch(is_zero, zero_case, nonzero_case)
            .map_err(&err)?;

        self.builder.position_at_end(zero_case);
        self.builder
            .build_call(printf, &[zero_digit.into()], "print_zero")
            .map_err(&err)?;
        self.builder.build_unconditional_branch(done).map_err(&err)?;

        self.builder.position_at_end(nonzero_case);
        let ctlz = self.ctlz_i64();
        let false_flag = self.context.bool_type().const_zero();
        let leading_zeros = self
            .builder
            .build_call(ctlz, &[arg.into(), false_flag.into()], "ctlz")
            .map_err(&err)?
            .try_as_basic_value()
            .left()
            .expect("llvm.ctlz.i64 returns a value")
            .into_int_value();
        let bit_width = i64_type.const_int(63, false);
        let highest = self
            .builder
            .build_int_sub(bit_width, leading_zeros, "highest_bit")
            .map_err(&err)?;
        self.builder.build_unconditional_branch(loop_header).map_err(&err)?;

        self.builder.position_at_end(loop_header);
        let idx_phi = self.builder.build_phi(i64_type, "idx").map_err(&err)?;
        idx_phi.add_incoming(&[(&highest, nonzero_case)]);
        let idx: IntValue<'ctx> = idx_phi.as_basic_value().into_int_value();
        let continues = self
            .builder
            .build_int_compare(inkwell::IntPredicate::SGE, idx, i64_type.const_zero(), "continues")
            .map_err(&err)?;
        self.builder
            .build_conditional_branch(continues, loop_body, done)
            .map_err(&err)?;

        self.builder.position_at_end(loop_body);
        let shifted = self
            .builder
            .build_right_shift(arg, idx, false, "shifted")
            .map_err(&err)?;
        let bit = self
            .builder
            .build_and(shifted, i64_type.const_int(1, false), "bit")
            .map_err(&err)?;
        let is_one = self
            .builder
            .build_int_compare(inkwell::IntPredicate::EQ, bit, i64_type.const_int(1, false), "is_one")
            .map_err(&err)?;
        let one_char = self.context.i8_type().const_int(b'1' as u64, false);
        let zero_char = self.context.i8_type().const_int(b'0' as u64, false);
        let digit = self
            .builder
            .build_select(is_one, one_char, zero_char, "digit")
            .map_err(&err)?
            .into_int_value();
        let digit_promoted = self
            .builder
            .build_int_s_extend(digit, self.context.i32_type(), "digit_promote")
            .map_err(&err)?;
        self.builder
            .build_call(printf, &[digit_fmt.into(), digit_promoted.into()], "print_digit")
            .map_err(&err)?;
        let next_idx = self
            .builder
            .build_int_sub(idx, i64_type.const_int(1, false), "next_idx")
            .map_err(&err)?;
        self.builder.build_unconditional_branch(loop_header).map_err(&err)?;
        idx_phi.add_incoming(&[(&next_idx, loop_body)]);

        self.builder.position_at_end(done);
        self.builder
            .build_call(printf, &[newline.into()], "print_newline")
            .map_err(&err)?;
        self.builder.build_return(None).map_err(&err)?;

        Ok(function)
    }
}
