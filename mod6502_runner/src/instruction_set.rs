use mod6502_lib::{little_endian, EmulationResult, Emulator, Machine};

/*
 * Demonstration instruction set
 * a handful of real 6502 opcodes written against the core's handler contract.
 * The core ships with none; this is the set the runner wires before
 * executing a program. Cycle charges match the hardware counts once the
 * implicit fetch charges are added up.
 */

/// Reset mechanism wired at construction: the canonical power-on state.
pub fn reset(machine: &mut dyn Machine) -> EmulationResult<()> {
    let program_offset = machine.program_offset();
    let regs = machine.regs();
    regs.command_pointer = program_offset;
    regs.stack_pointer = 0xff;
    regs.status_register = 0x00;
    regs.accumulator = 0x00;
    regs.register_x = 0x00;
    regs.register_y = 0x00;

    Ok(())
}

pub fn register_instruction_set(emulator: &mut Emulator) {
    emulator.add_instruction(0xa9, lda_immediate);
    emulator.add_instruction(0xa2, ldx_immediate);
    emulator.add_instruction(0xa0, ldy_immediate);
    emulator.add_instruction(0x8d, sta_absolute);
    emulator.add_instruction(0x69, adc_immediate);
    emulator.add_instruction(0xe8, inx);
    emulator.add_instruction(0xea, nop);
}

fn lda_immediate(machine: &mut dyn Machine) -> EmulationResult<()> {
    let operand = machine.fetch()?;
    let regs = machine.regs();
    regs.accumulator = operand;
    regs.set_z_flag(operand == 0);
    regs.set_n_flag(operand & 0b10000000 != 0);

    Ok(())
}

fn ldx_immediate(machine: &mut dyn Machine) -> EmulationResult<()> {
    let operand = machine.fetch()?;
    let regs = machine.regs();
    regs.register_x = operand;
    regs.set_z_flag(operand == 0);
    regs.set_n_flag(operand & 0b10000000 != 0);

    Ok(())
}

fn ldy_immediate(machine: &mut dyn Machine) -> EmulationResult<()> {
    let operand = machine.fetch()?;
    let regs = machine.regs();
    regs.register_y = operand;
    regs.set_z_flag(operand == 0);
    regs.set_n_flag(operand & 0b10000000 != 0);

    Ok(())
}

fn sta_absolute(machine: &mut dyn Machine) -> EmulationResult<()> {
    let operands = [machine.fetch()?, machine.fetch()?];
    let addr = little_endian(&operands);
    let value = machine.regs().accumulator;

    machine.write(addr, value)
}

// binary mode only, the decimal flag is ignored
fn adc_immediate(machine: &mut dyn Machine) -> EmulationResult<()> {
    let operand = machine.fetch()?;
    let regs = machine.regs();
    let accumulator = regs.accumulator;
    let sum = accumulator as u16 + operand as u16 + regs.c_flag_is_set() as u16;
    let result = sum as u8;

    regs.accumulator = result;
    regs.set_c_flag(sum > 0xff);
    regs.set_z_flag(result == 0);
    regs.set_n_flag(result & 0b10000000 != 0);
    regs.set_v_flag((accumulator ^ result) & (operand ^ result) & 0b10000000 != 0);

    Ok(())
}

fn inx(machine: &mut dyn Machine) -> EmulationResult<()> {
    machine.take(1);
    let regs = machine.regs();
    regs.register_x = regs.register_x.wrapping_add(1);
    regs.set_z_flag(regs.register_x == 0);
    regs.set_n_flag(regs.register_x & 0b10000000 != 0);

    Ok(())
}

fn nop(machine: &mut dyn Machine) -> EmulationResult<()> {
    machine.take(1);

    Ok(())
}
